//! Status messages for the operator. They go to stderr; stdout carries the tailed log.
#[macro_export]
macro_rules! success_message {
    ($($arg:tt)*) => {{
        eprintln!("{} {}", "[SUCCESS]".green().bold(), format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! error_message {
    ($($arg:tt)*) => {{
        eprintln!("{} {}", "  [ERROR]".red().bold(), format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! warning_message {
    ($($arg:tt)*) => {{
        eprintln!("{} {}", "[WARNING]".yellow().bold(), format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! info_message {
    ($($arg:tt)*) => {{
        eprintln!("{} {}", "   [INFO]".cyan().bold(), format!($($arg)*));
    }};
}
