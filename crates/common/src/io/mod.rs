mod dot;

pub use dot::parse_dot;
pub use dot::read_dot;
pub use dot::write_dot;
pub use dot::write_dot_file;
pub use dot::ReadDotError;
pub use dot::WriteDotError;
