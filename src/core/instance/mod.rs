pub mod model;
pub mod server;
pub mod session;

pub use model::{register_global_settings, MinecraftInstance, LAUNCHER_NAME};
pub use server::{
    HickoryLookup, ServerResolver, ServerTarget, SrvLookup, SrvRecord, SystemResolver, DEFAULT_SERVER_PORT,
};
pub use session::{AuthSession, SessionStatus};
