pub mod browser_session;
pub mod http_session;
pub mod js_executor;
pub mod session;

pub use browser_session::{BrowserSession, BrowserSessionFactory};
pub use http_session::{HttpSession, HttpSessionFactory};
pub use js_executor::JsExecutor;
pub use session::{
    ByteStream, CandidateElement, FetchSession, FetchedPage, FetchedResponse, PageSession, Session,
    SessionFactory,
};
