//! Macros for status store error handling.
//!
//! Provides convenience macros for creating and returning [`crate::error::DrError`]
//! instances with reduced boilerplate.

/// Creates a [`crate::error::DrError`] from error kind and description.
///
/// Accepts either a static description or a static description plus
/// dynamic detail information.
#[macro_export]
macro_rules! dr_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::DrError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::DrError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::DrError`] from the current function.
///
/// Combines error creation with early return for conditions that should
/// immediately terminate execution.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::dr_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::dr_error!($kind, $desc, $detail))
    };
}
