mod settings_object;

pub use settings_object::{default_data_dir, SettingKind, SettingValue, SettingsObject};
