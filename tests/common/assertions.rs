//! Custom assertion macros and utilities
//!
//! Provides assertion macros for notification queues with descriptive
//! failure messages.

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Receive the next notification or fail after a (virtual) second
#[macro_export]
macro_rules! assert_receives {
    ($receiver:expr) => {
        match tokio::time::timeout(std::time::Duration::from_secs(1), $receiver.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => panic!("Expected a notification, queue closed"),
            Err(_) => panic!("Expected a notification, none arrived"),
        }
    };
}

/// Assert that no notification arrives within a (virtual) second
#[macro_export]
macro_rules! assert_silent {
    ($receiver:expr) => {
        if let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_secs(1), $receiver.recv()).await
        {
            panic!("Expected no notification, got {:?}", event);
        }
    };
}
