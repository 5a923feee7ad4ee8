pub mod client;
pub mod controller;
pub mod duration;
pub mod presenter;

pub use client::{HttpPickerApi, PickerApi};
pub use controller::{PickOutcome, PickerPhase, PickerSessionController};
pub use presenter::{ConsoleWindowHost, PresentationMode, Presenter, TargetWindow, WindowHost};
