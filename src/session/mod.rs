pub mod confirmation;
pub mod console;
pub mod controller;
pub mod state;

pub use confirmation::ConfirmationGate;
pub use controller::{ModeRequest, SessionController, SessionSnapshot};
pub use state::{SessionMode, SessionView};
