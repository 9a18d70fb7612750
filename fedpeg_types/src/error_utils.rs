/// Returns early with the given error
#[macro_export]
macro_rules! abort {
    ($err:expr) => {
        return Err($err.into())
    };
}

/// Returns early with the given error if the condition does not hold
#[macro_export]
macro_rules! verify {
    ($cond:expr, $err:expr) => {
        if !$cond {
            $crate::abort!($err);
        }
    };
}
