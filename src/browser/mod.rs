pub mod connection;
pub mod headless;
pub mod login;

pub use connection::connect_to_browser_and_page;
pub use headless::{launch_browser, LaunchOptions};
