pub mod command_runner;
pub mod manifest_editor;
pub mod version_control;

pub use command_runner::{CommandRunner, ProcessRunner};
pub use manifest_editor::ManifestEditor;
pub use version_control::{GitAgent, VersionControl};
