//! Logging macros that record the calling function.
//!
//! ```rust,ignore
//! fn some_func(log: &ContextLogger) {
//!     veil::warn!(log, "retrying in {}s", 5);
//! }
//! ```
//!
//! The record's `function` is `some_func` rather than a `file:line` location.

/// Expands to the fully qualified path of the enclosing function.
///
/// Inside closures and async blocks the path ends in `{{closure}}`, which
/// [`ShortFunctionName`](crate::format::ShortFunctionName) skips.
#[macro_export]
macro_rules! function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        name.strip_suffix("::f").unwrap_or(name)
    }};
}

/// Logs at `level` and returns the write result.
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger
            .at($crate::function_name!())
            .log($level, ::std::format!($($arg)+))
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $logger.at($crate::function_name!()).trace(::std::format!($($arg)+))
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.at($crate::function_name!()).debug(::std::format!($($arg)+))
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.at($crate::function_name!()).info(::std::format!($($arg)+))
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $logger.at($crate::function_name!()).warn(::std::format!($($arg)+))
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.at($crate::function_name!()).error(::std::format!($($arg)+))
    };
}

#[cfg(test)]
mod tests {
    use crate::logger::Logger;
    use crate::sink::BufferSink;
    use serde_json::Value;
    use tracing::Level;
    use tracing::level_filters::LevelFilter;

    fn named_caller() -> &'static str {
        crate::function_name!()
    }

    fn logger(sink: &BufferSink) -> Logger {
        Logger::builder()
            .writer(sink.clone())
            .max_level(LevelFilter::TRACE)
            .build()
            .unwrap()
    }

    fn some_func(log: &crate::ContextLogger) {
        crate::warn!(log, "retrying in {}s", 5);
    }

    #[test]
    fn resolves_the_enclosing_function() {
        assert_eq!(named_caller(), "veil::macros::tests::named_caller");

        let in_closure = (|| crate::function_name!())();
        assert!(in_closure.ends_with("{{closure}}"));
    }

    #[test]
    fn level_macros_report_the_function() {
        let sink = BufferSink::new();
        some_func(&logger(&sink).with_field("logger", "main"));

        let record: Value = serde_json::from_str(&sink.lines()[0]).unwrap();
        assert_eq!(record["function"], "some_func");
        assert_eq!(record["message"], "retrying in 5s");
        assert_eq!(record["level"], "WARN");
        assert_eq!(record["logger"], "main");
    }

    #[test]
    fn log_macro_returns_the_result() {
        let sink = BufferSink::new();
        let log = logger(&sink).root();

        crate::log!(log, Level::DEBUG, "value={}", 42).unwrap();
        crate::trace!(log, "t");
        crate::debug!(log, "d");
        crate::info!(log, "i");
        crate::error!(log, "e");

        assert_eq!(sink.lines().len(), 5);
    }
}
