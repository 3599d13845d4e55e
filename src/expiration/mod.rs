mod cleaner;

pub use cleaner::start_revocation_sweeper;
