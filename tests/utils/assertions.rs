//! Custom assertions for market tests

/// Assert a market action succeeded
#[macro_export]
macro_rules! assert_success {
    ($result:expr) => {
        match &$result {
            Ok(_) => {}
            Err(err) => panic!("Market action failed: {:?}", err),
        }
    };
}

/// Assert a market action failed with a specific error
#[macro_export]
macro_rules! assert_market_error {
    ($result:expr, $expected_error:expr) => {
        match $result {
            Err(err) => assert_eq!(err, $expected_error, "Market error mismatch"),
            Ok(_) => panic!("Expected market error but succeeded"),
        }
    };
    ($result:expr, $expected_error:expr, $($msg:tt)*) => {
        match $result {
            Err(err) => assert_eq!(err, $expected_error, $($msg)*),
            Ok(_) => panic!("Expected market error but succeeded"),
        }
    };
}

/// Assert a market action failed with an error of the given class
#[macro_export]
macro_rules! assert_error_class {
    ($result:expr, $class:expr) => {
        match $result {
            Err(err) => assert_eq!(err.class(), $class, "Unexpected error class for {:?}", err),
            Ok(_) => panic!("Expected {:?} failure but succeeded", $class),
        }
    };
}

/// Assert an approval left the listing in the given status
#[macro_export]
macro_rules! assert_status {
    ($outcome:expr, $status:expr) => {
        assert_eq!($outcome.status, $status, "Listing status mismatch")
    };
}
