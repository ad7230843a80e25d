pub mod credential;
pub mod dispatcher;
pub mod factory;
pub mod models;
pub mod pager;
pub mod pool;
pub mod route;
pub mod transport;

pub use credential::{Access, Credential, CredentialKind, Scope};
pub use dispatcher::Dispatcher;
pub use factory::Descriptor;
pub use pager::{LinkPager, Pager};
pub use pool::TokenPool;
pub use route::{parse_repo_ref, ApiRoute, RepoRef};
pub use transport::{ApiReply, ApiTransport, AuthMode, GitHubTransport, Outcome};
