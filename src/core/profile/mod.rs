mod component;
mod launch_profile;

pub use component::{load_patch, Component, ComponentList};
pub use launch_profile::LaunchProfile;
