// ─── Minecraft Instance ───
// An instance folder with its settings and component list, and everything derived from
// them at launch time: Java arguments, game arguments, the launch script and the
// launch task itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use regex::Regex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use super::server::{ServerResolver, ServerTarget, SystemResolver, DEFAULT_SERVER_PORT};
use super::session::AuthSession;
use crate::core::assets::{assets_dir_for, AssetUpdateJob};
use crate::core::downloader::{DownloadJob, Downloader, FileMetaCache, HttpDownloadJob, MetaCache, NetMode};
use crate::core::error::LauncherResult;
use crate::core::java::JavaVersion;
use crate::core::launch::script::split_args;
use crate::core::launch::steps::{
    CheckJava, CommandKind, CreateGameFolders, CustomCommand, ExtractNatives, LauncherPartLaunch,
    LookupServerAddress, ModMinecraftJar, PrintInstanceInfo, ReconstructAssets, TextPrint, Update,
    UpdatePlan, VerifyJavaInstall,
};
use crate::core::launch::{LaunchEvent, LaunchTask, MessageLevel};
use crate::core::pattern::cached_regex;
use crate::core::profile::{ComponentList, LaunchProfile};
use crate::core::rules::RuntimeContext;
use crate::core::settings::SettingsObject;

pub const LAUNCHER_NAME: &str = "ProfileLaunch";
const SETTINGS_FILE: &str = "instance.json";

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

/// Register every setting an instance can override on the launcher-wide settings object.
pub fn register_global_settings(global: &SettingsObject) {
    global.register_setting("JavaPath", "java");
    global.register_setting("JavaTimestamp", 0_i64);
    for id in ["JavaVersion", "JavaArchitecture", "JavaRealArchitecture", "JavaVendor"] {
        global.register_setting(id, "");
    }
    global.register_setting("JvmArgs", "");
    global.register_setting("MinMemAlloc", 512_i64);
    global.register_setting("MaxMemAlloc", 1024_i64);
    global.register_setting("PermGen", 128_i64);
    global.register_setting("LaunchMaximized", false);
    global.register_setting("MinecraftWinWidth", 854_i64);
    global.register_setting("MinecraftWinHeight", 480_i64);
    global.register_setting("PreLaunchCommand", "");
    global.register_setting("PostExitCommand", "");
    global.register_setting("WrapperCommand", "");
    global.register_setting("IgnoreJavaCompatibility", false);
    global.register_setting("UseNativeOpenAL", false);
    global.register_setting("UseNativeGLFW", false);
    global.register_setting("LauncherJarPath", "");
    global.register_setting("JavaCheckTimeoutMs", 15_000_i64);
}

fn register_instance_settings(local: &SettingsObject, global: &Arc<SettingsObject>, id: &str) -> LauncherResult<()> {
    local.register_setting("name", id);
    local.register_setting("LastLaunchTime", 0_i64);

    // Java
    local.register_setting_with_synonyms(&["OverrideJavaLocation", "OverrideJava"], false);
    local.register_setting("OverrideJavaArgs", false);
    local.register_override("JavaPath", global.clone(), "OverrideJavaLocation")?;
    local.register_override("IgnoreJavaCompatibility", global.clone(), "OverrideJavaLocation")?;
    local.register_override("JavaCheckTimeoutMs", global.clone(), "OverrideJavaLocation")?;
    local.register_override("JvmArgs", global.clone(), "OverrideJavaArgs")?;
    for id in [
        "JavaTimestamp",
        "JavaVersion",
        "JavaArchitecture",
        "JavaRealArchitecture",
        "JavaVendor",
    ] {
        local.register_passthrough(id, global.clone(), "OverrideJavaLocation")?;
    }

    // Window
    local.register_setting("OverrideWindow", false);
    for id in ["LaunchMaximized", "MinecraftWinWidth", "MinecraftWinHeight"] {
        local.register_override(id, global.clone(), "OverrideWindow")?;
    }

    // Memory
    local.register_setting("OverrideMemory", false);
    for id in ["MinMemAlloc", "MaxMemAlloc", "PermGen"] {
        local.register_override(id, global.clone(), "OverrideMemory")?;
    }

    // Native library workarounds
    local.register_setting("OverrideNativeWorkarounds", false);
    for id in ["UseNativeOpenAL", "UseNativeGLFW"] {
        local.register_override(id, global.clone(), "OverrideNativeWorkarounds")?;
    }

    // Custom commands
    local.register_setting("OverrideCommands", false);
    for id in ["PreLaunchCommand", "PostExitCommand", "WrapperCommand"] {
        local.register_override(id, global.clone(), "OverrideCommands")?;
    }

    // Join server on launch has no global counterpart
    local.register_setting("JoinServerOnLaunch", false);
    local.register_setting("JoinServerOnLaunchAddress", "");
    Ok(())
}

/// A Minecraft instance folder.
///
/// Layout under `root`:
/// - `instance.json`  instance settings
/// - `mmc-pack.json`  component list, with `patches/` overrides
/// - `.minecraft/`    game working directory
/// - `libraries/`     local-hint libraries
/// - `jarmods/`       jar mod archives
/// - `natives/`       extracted natives while the game runs
///
/// Shared stores (libraries, assets, metadata) live under `data_root`.
pub struct MinecraftInstance {
    id: String,
    root: PathBuf,
    data_root: PathBuf,
    global: Arc<SettingsObject>,
    settings: Arc<SettingsObject>,
    components: RwLock<ComponentList>,
    cache: Arc<FileMetaCache>,
    downloader: Arc<Downloader>,
    resolver: Arc<dyn ServerResolver>,
}

impl MinecraftInstance {
    /// Open the instance in `root`. `global` must already carry [`register_global_settings`].
    pub fn load(
        root: impl Into<PathBuf>,
        data_root: impl Into<PathBuf>,
        global: Arc<SettingsObject>,
    ) -> LauncherResult<Self> {
        let root = root.into();
        let data_root = data_root.into();
        let id = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let settings = SettingsObject::load(root.join(SETTINGS_FILE))?;
        register_instance_settings(&settings, &global, &id)?;

        let components = ComponentList::load(&root, data_root.join("meta"))?;

        let cache = Arc::new(FileMetaCache::load(data_root.join("metacache")));
        cache.add_base("libraries", data_root.join("libraries"));
        cache.add_base("assets", data_root.join("assets"));
        let downloader = Downloader::new()?.with_cache(cache.clone() as Arc<dyn MetaCache>);

        info!("Loaded instance {} from {:?}", id, root);
        Ok(Self {
            id,
            root,
            data_root,
            global,
            settings: Arc::new(settings),
            components: RwLock::new(components),
            cache,
            downloader: Arc::new(downloader),
            resolver: Arc::new(SystemResolver::new()),
        })
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ServerResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    // ── Identity & settings ─────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> String {
        self.settings.get_string("name").unwrap_or_else(|_| self.id.clone())
    }

    pub fn window_title(&self) -> String {
        format!("{}: {}", LAUNCHER_NAME, self.name())
    }

    pub fn settings(&self) -> &Arc<SettingsObject> {
        &self.settings
    }

    pub fn global_settings(&self) -> &Arc<SettingsObject> {
        &self.global
    }

    pub fn downloader(&self) -> &Arc<Downloader> {
        &self.downloader
    }

    pub fn set_last_launch(&self) -> LauncherResult<()> {
        self.settings
            .set("LastLaunchTime", chrono::Utc::now().timestamp_millis())
    }

    // ── Paths ───────────────────────────────────────────

    pub fn instance_root(&self) -> &Path {
        &self.root
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// `minecraft/` when only that exists, `.minecraft/` otherwise.
    pub fn game_root(&self) -> PathBuf {
        let mc_dir = self.root.join("minecraft");
        let dot_mc_dir = self.root.join(".minecraft");
        if mc_dir.exists() && !dot_mc_dir.exists() {
            mc_dir
        } else {
            dot_mc_dir
        }
    }

    pub fn bin_root(&self) -> PathBuf {
        self.game_root().join("bin")
    }

    pub fn natives_dir(&self) -> PathBuf {
        self.root.join("natives")
    }

    pub fn local_library_path(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn jar_mods_dir(&self) -> PathBuf {
        self.root.join("jarmods")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.game_root().join("resources")
    }

    pub fn assets_root(&self) -> PathBuf {
        self.data_root.join("assets")
    }

    // ── Components & profile ────────────────────────────

    pub fn components(&self) -> RwLockReadGuard<'_, ComponentList> {
        match self.components.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn components_mut(&self) -> RwLockWriteGuard<'_, ComponentList> {
        match self.components.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Context with the Java half taken from the last Java check.
    pub fn runtime_context(&self) -> RuntimeContext {
        let mut ctx = RuntimeContext::current();
        let arch = self.settings.get_string("JavaArchitecture").unwrap_or_default();
        let real_arch = self.settings.get_string("JavaRealArchitecture").unwrap_or_default();
        ctx.set_java(&arch, &real_arch);
        ctx
    }

    pub fn profile(&self) -> LauncherResult<Arc<LaunchProfile>> {
        self.components().get_profile(&self.runtime_context())
    }

    pub fn invalidate_launch_profile(&self) {
        self.components().invalidate_launch_profile();
    }

    pub fn java_version(&self) -> JavaVersion {
        JavaVersion::parse(&self.settings.get_string("JavaVersion").unwrap_or_default())
    }

    /// Classpath jars and native jars for the current context.
    pub fn library_files(&self, profile: &LaunchProfile) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let local = self.local_library_path();
        profile.get_library_files(
            &self.runtime_context(),
            Some(&local),
            &self.bin_root(),
            &self.data_root,
        )
    }

    // ── Arguments ───────────────────────────────────────

    /// User JVM arguments, profile JVM arguments and agents.
    pub fn extra_arguments(&self) -> LauncherResult<Vec<String>> {
        let mut args = split_args(&self.settings.get_string("JvmArgs")?);
        let profile = self.profile()?;
        if !profile.get_jar_mods().is_empty() {
            args.push("-Dfml.ignoreInvalidMinecraftCertificates=true".to_string());
            args.push("-Dfml.ignorePatchDiscrepancies=true".to_string());
        }
        args.extend(profile.get_add_jvm_arguments().iter().cloned());
        let ctx = self.runtime_context();
        for agent in profile.get_agents() {
            args.extend(agent.java_arguments(&ctx, &self.data_root));
        }
        Ok(args)
    }

    pub fn java_arguments(&self) -> LauncherResult<Vec<String>> {
        let mut args = self.extra_arguments()?;

        let min = self.settings.get_int("MinMemAlloc")?;
        let max = self.settings.get_int("MaxMemAlloc")?;
        let (low, high) = if min < max { (min, max) } else { (max, min) };
        args.push(format!("-Xms{}m", low));
        args.push(format!("-Xmx{}m", high));

        if self.java_version().requires_perm_gen() {
            let permgen = self.settings.get_int("PermGen")?;
            if permgen != 64 {
                args.push(format!("-XX:PermSize={}m", permgen));
            }
        }

        args.push("-Duser.language=en".to_string());
        Ok(args)
    }

    /// Variables exported to custom commands and the game process.
    pub fn get_variables(&self) -> LauncherResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        out.insert("INST_NAME".to_string(), self.name());
        out.insert("INST_ID".to_string(), self.id.clone());
        out.insert("INST_DIR".to_string(), self.root.display().to_string());
        out.insert("INST_MC_DIR".to_string(), self.game_root().display().to_string());
        out.insert("INST_JAVA".to_string(), self.settings.get_string("JavaPath")?);
        out.insert("INST_JAVA_ARGS".to_string(), self.java_arguments()?.join(" "));
        Ok(out)
    }

    /// Game arguments with `${token}`s substituted. Unknown tokens are dropped.
    pub fn process_minecraft_args(
        &self,
        profile: &LaunchProfile,
        session: Option<&AuthSession>,
        server: Option<&ServerTarget>,
    ) -> LauncherResult<Vec<String>> {
        let mut pattern = profile.get_minecraft_arguments().to_string();
        for tweaker in profile.get_tweakers() {
            pattern.push_str(" --tweakClass ");
            pattern.push_str(tweaker);
        }

        if let Some(server) = server.filter(|s| !s.address.is_empty()) {
            pattern.push_str(&format!(" --server {} --port {}", server.address, server.port));
        }

        let mut tokens = BTreeMap::new();
        if let Some(session) = session {
            tokens.insert("auth_session", session.session.clone());
            tokens.insert("auth_access_token", session.access_token.clone());
            tokens.insert("auth_player_name", session.player_name.clone());
            tokens.insert("auth_uuid", session.uuid.clone());
            tokens.insert("user_properties", session.user_properties.clone());
            tokens.insert("user_type", session.user_type.clone());
            if session.demo {
                pattern.push_str(" --demo");
            }
        }

        tokens.insert("profile_name", LAUNCHER_NAME.to_string());
        tokens.insert("version_name", LAUNCHER_NAME.to_string());
        tokens.insert("version_type", profile.get_minecraft_version_type().to_string());
        tokens.insert("game_directory", self.game_root().display().to_string());

        let assets = profile.get_minecraft_assets();
        let assets_root = self.assets_root();
        tokens.insert(
            "game_assets",
            assets_dir_for(&assets_root, &assets.id, &self.resources_dir())
                .display()
                .to_string(),
        );
        tokens.insert("assets_root", assets_root.display().to_string());
        tokens.insert("assets_index_name", assets.id.clone());

        let token_re = cached_regex(&TOKEN_RE, r"\$\{(.+?)\}")?;
        Ok(pattern
            .split(' ')
            .filter(|part| !part.is_empty())
            .map(|part| {
                token_re
                    .replace_all(part, |caps: &regex::Captures| {
                        tokens.get(&caps[1]).cloned().unwrap_or_default()
                    })
                    .into_owned()
            })
            .collect())
    }

    /// The line protocol read by the launcher part on its standard input.
    pub fn create_launch_script(&self, session: &AuthSession, server: Option<&ServerTarget>) -> LauncherResult<String> {
        let profile = self.profile()?;
        let mut script = String::new();
        let mut line = |key: &str, value: &str| {
            script.push_str(key);
            script.push(' ');
            script.push_str(value);
            script.push('\n');
        };

        if !profile.get_main_class().is_empty() {
            line("mainClass", profile.get_main_class());
        }
        if !profile.get_applet_class().is_empty() {
            line("appletClass", profile.get_applet_class());
        }

        if let Some(server) = server.filter(|s| !s.address.is_empty()) {
            line("serverAddress", &server.address);
            line("serverPort", &server.port.to_string());
        }

        // The server is passed through serverAddress/serverPort above
        for param in self.process_minecraft_args(&profile, Some(session), None)? {
            line("param", &param);
        }

        let window_params = if self.settings.get_bool("LaunchMaximized")? {
            "max".to_string()
        } else {
            format!(
                "{}x{}",
                self.settings.get_int("MinecraftWinWidth")?,
                self.settings.get_int("MinecraftWinHeight")?
            )
        };
        line("windowTitle", &self.window_title());
        line("windowParams", &window_params);

        line("userName", &session.player_name);
        line("sessionId", &session.session);

        let (jars, natives) = self.library_files(&profile);
        for jar in &jars {
            line("cp", &jar.display().to_string());
        }
        for native in &natives {
            line("ext", &native.display().to_string());
        }
        line("natives", &self.natives_dir().display().to_string());

        for t in profile.get_traits() {
            line("traits", t);
        }
        let launcher = if profile.has_trait("legacyLaunch") {
            "legacy"
        } else {
            "standard"
        };
        line("launcher", launcher);
        Ok(script)
    }

    /// Human-readable launch summary printed before the game starts.
    pub fn verbose_description(&self, session: Option<&AuthSession>, server: Option<&ServerTarget>) -> LauncherResult<Vec<String>> {
        let profile = self.profile()?;
        let mut out = vec![
            "Main Class:".to_string(),
            format!("  {}", profile.get_main_class()),
            String::new(),
            "Native path:".to_string(),
            format!("  {}", self.natives_dir().display()),
            String::new(),
        ];

        if !profile.get_traits().is_empty() {
            out.push("Traits:".to_string());
            out.extend(profile.get_traits().iter().map(|t| format!("traits {}", t)));
            out.push(String::new());
        }

        let native_openal = self.settings.get_bool("UseNativeOpenAL")?;
        let native_glfw = self.settings.get_bool("UseNativeGLFW")?;
        if native_openal || native_glfw {
            if native_openal {
                out.push("Using system OpenAL.".to_string());
            }
            if native_glfw {
                out.push("Using system GLFW.".to_string());
            }
            out.push(String::new());
        }

        let describe = |path: &PathBuf| {
            if path.exists() {
                format!("  {}", path.display())
            } else {
                format!("  {} (missing)", path.display())
            }
        };
        let (jars, natives) = self.library_files(&profile);
        out.push("Libraries:".to_string());
        out.extend(jars.iter().map(describe));
        out.push(String::new());
        out.push("Native libraries:".to_string());
        out.extend(natives.iter().map(describe));
        out.push(String::new());

        if !profile.get_jar_mods().is_empty() {
            let ctx = self.runtime_context();
            out.push("Jar Mods:".to_string());
            for jar_mod in profile.get_jar_mods() {
                let file_name = jar_mod.storage_filename(&ctx);
                if !jar_mod.display_name.is_empty() && jar_mod.display_name != file_name {
                    out.push(format!("  {} ({})", jar_mod.display_name, file_name));
                } else {
                    out.push(format!("  {}", file_name));
                }
            }
            out.push(String::new());
        }

        out.push("Params:".to_string());
        out.push(format!(
            "  {}",
            self.process_minecraft_args(&profile, session, server)?.join(" ")
        ));
        out.push(String::new());

        if self.settings.get_bool("LaunchMaximized")? {
            out.push("Window size: max (if available)".to_string());
        } else {
            out.push(format!(
                "Window size: {} x {}",
                self.settings.get_int("MinecraftWinWidth")?,
                self.settings.get_int("MinecraftWinHeight")?
            ));
        }
        out.push(String::new());
        Ok(out)
    }

    // ── Update ──────────────────────────────────────────

    /// Library and asset downloads the instance needs before it can launch.
    pub fn create_update_plan(&self, mode: NetMode) -> LauncherResult<UpdatePlan> {
        self.invalidate_launch_profile();
        let profile = self.profile()?;
        let ctx = self.runtime_context();
        let local = self.local_library_path();
        let cache: &dyn MetaCache = self.cache.as_ref();

        let mut failed_local_files = Vec::new();
        let mut libraries = HttpDownloadJob::new("Libraries", self.downloader.clone(), mode);
        let agent_libraries = profile.get_agents().iter().map(|a| &a.library);
        for lib in profile
            .get_libraries()
            .iter()
            .chain(profile.get_native_libraries())
            .chain(profile.get_maven_files())
            .chain(profile.get_main_jar())
            .chain(agent_libraries)
        {
            libraries.extend(lib.get_downloads(&ctx, cache, &mut failed_local_files, Some(&local)));
        }
        debug!(
            "Update plan for {}: {} library downloads, {} missing local files",
            self.id,
            libraries.requests().len(),
            failed_local_files.len()
        );

        let assets = AssetUpdateJob::new(
            profile.get_minecraft_assets(),
            self.assets_root(),
            self.downloader.clone(),
            mode,
        );
        let jobs: Vec<Box<dyn DownloadJob>> = vec![Box::new(libraries), Box::new(assets)];
        Ok(UpdatePlan {
            jobs,
            failed_local_files,
        })
    }

    // ── Launch ──────────────────────────────────────────

    /// Assemble the launch task for `session`, joining `server` (or the configured
    /// join-on-launch server) once the game is up.
    pub fn create_launch_task(
        self: &Arc<Self>,
        session: AuthSession,
        server: Option<ServerTarget>,
    ) -> LauncherResult<(LaunchTask, UnboundedReceiver<LaunchEvent>)> {
        let (mut task, events) = LaunchTask::new();
        let game_root = self.game_root();

        task.append_step(Box::new(TextPrint::line(
            format!("Minecraft folder is:\n{}\n\n", game_root.display()),
            MessageLevel::Launcher,
        )));

        let per_instance = self.settings.get_bool("OverrideJavaLocation")?;
        task.append_step(Box::new(CheckJava::new(self.settings.clone(), per_instance)));

        task.append_step(Box::new(CreateGameFolders::new(&game_root)));

        let server = match server {
            Some(server) => Some(server),
            None if self.settings.get_bool("JoinServerOnLaunch")? => Some(ServerTarget::parse(
                &self.settings.get_string("JoinServerOnLaunchAddress")?,
            )),
            None => None,
        };
        let lookup_address = server
            .as_ref()
            .filter(|s| s.port == DEFAULT_SERVER_PORT)
            .map(|s| s.address.clone());
        let server_slot = Arc::new(Mutex::new(server));
        if let Some(address) = lookup_address {
            task.append_step(Box::new(LookupServerAddress::new(
                address,
                server_slot.clone(),
                self.resolver.clone(),
            )));
        }

        let pre_launch = self.settings.get_string("PreLaunchCommand")?;
        if !pre_launch.trim().is_empty() {
            task.append_step(Box::new(CustomCommand::new(
                CommandKind::PreLaunch,
                pre_launch,
                &game_root,
                self.get_variables()?,
            )));
        }

        let mode = if session.is_offline() {
            NetMode::Offline
        } else {
            NetMode::Online
        };
        let planner_instance = self.clone();
        task.append_step(Box::new(Update::new(Arc::new(move || {
            planner_instance.create_update_plan(mode)
        }))));

        task.append_step(Box::new(ModMinecraftJar::new(self.clone())));
        task.append_step(Box::new(PrintInstanceInfo::new(
            self.clone(),
            session.clone(),
            server_slot.clone(),
        )));
        task.append_step(Box::new(ExtractNatives::new(self.clone())));
        task.append_step(Box::new(ReconstructAssets::new(self.clone())));
        task.append_step(Box::new(VerifyJavaInstall::new(self.clone())));
        task.append_step(Box::new(LauncherPartLaunch::new(
            self.clone(),
            session.clone(),
            server_slot,
        )));

        let post_exit = self.settings.get_string("PostExitCommand")?;
        if !post_exit.trim().is_empty() {
            task.append_step(Box::new(CustomCommand::new(
                CommandKind::PostExit,
                post_exit,
                &game_root,
                self.get_variables()?,
            )));
        }

        task.set_censor_filter(session.censor_filter());
        Ok((task, events))
    }
}
