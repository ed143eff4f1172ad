mod check_java;
mod create_game_folders;
mod custom_command;
mod extract_natives;
mod launcher_part;
mod lookup_server;
mod mod_minecraft_jar;
mod print_instance_info;
mod reconstruct_assets;
mod text_print;
mod update;
mod verify_java;

pub use check_java::CheckJava;
pub use create_game_folders::CreateGameFolders;
pub use custom_command::{CommandKind, CustomCommand};
pub use extract_natives::{extract_native_jar, ExtractNatives, NativeJar, NativeSkips};
pub use launcher_part::LauncherPartLaunch;
pub use lookup_server::LookupServerAddress;
pub use mod_minecraft_jar::{merge_jar_mods, ModMinecraftJar};
pub use print_instance_info::PrintInstanceInfo;
pub use reconstruct_assets::ReconstructAssets;
pub use text_print::TextPrint;
pub use update::{Update, UpdatePlan, UpdatePlanner};
pub use verify_java::{is_compatible_java, VerifyJavaInstall};
