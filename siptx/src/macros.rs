/// Builds a [`Headers`](crate::message::Headers) list from header values.
#[macro_export]
macro_rules! headers {
    () => (
        $crate::message::Headers::new()
    );
    ($($x:expr),+ $(,)?) => (
        <$crate::message::Headers as ::core::convert::From<_>>::from(vec![$($x),+])
    );
}

/// Finds the first header of the given variant.
#[macro_export]
macro_rules! find_map_header {
    ($hdrs:expr, $header:ident) => {
        $hdrs.iter().find_map(|hdr| {
            if let $crate::message::Header::$header(v) = hdr {
                Some(v)
            } else {
                None
            }
        })
    };
}

/// Finds the first header of the given variant, mutably.
#[macro_export]
macro_rules! find_map_mut_header {
    ($hdrs:expr, $header:ident) => {
        $hdrs.iter_mut().find_map(|hdr| {
            if let $crate::message::Header::$header(v) = hdr {
                Some(v)
            } else {
                None
            }
        })
    };
}

/// Iterates over every header of the given variant.
#[macro_export]
macro_rules! filter_map_header {
    ($hdrs:expr, $header:ident) => {
        $hdrs.iter().filter_map(|hdr| {
            if let $crate::message::Header::$header(v) = hdr {
                Some(v)
            } else {
                None
            }
        })
    };
}
