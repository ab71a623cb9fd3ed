#[macro_export]
macro_rules! green {
    ($($arg:tt)*) => ({
        $crate::paint($crate::Colour::Green, format!($($arg)*))
    });
}

#[macro_export]
macro_rules! red {
    ($($arg:tt)*) => ({
        $crate::paint($crate::Colour::Red, format!($($arg)*))
    });
}

#[macro_export]
macro_rules! yellow {
    ($($arg:tt)*) => ({
        $crate::paint($crate::Colour::Yellow, format!($($arg)*))
    });
}

#[macro_export]
macro_rules! format_err {
    ($($arg:tt)*) => (
        {
            format!("{} {}", $crate::red!("error:"), format!($($arg)*))
        }
    )
}

#[macro_export]
macro_rules! format_note {
    ($($arg:tt)*) => (
        {
            format!("{} {}", $crate::green!("note:"), format!($($arg)*))
        }
    )
}
