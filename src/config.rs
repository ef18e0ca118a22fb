//! Runtime configuration, read from `JOLT_*` environment variables.

use std::env;

use colored::Colorize;

/// Default VM value-stack capacity (256 slots for each of 64 frames).
pub const DEFAULT_STACK_MAX: usize = 256 * 64;
/// Default maximum call depth, shared by the tree-walker and the VM.
pub const DEFAULT_MAX_DEPTH: usize = 512;
/// Default maximum number of VM call frames: one per counted call, plus the
/// frame of a compiled top-level form.
pub const DEFAULT_FRAMES_MAX: usize = DEFAULT_MAX_DEPTH + 1;

/// Limits for one VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    pub stack_max: usize,
    pub frames_max: usize,
    /// Instructions allowed per top-level execution; `None` means unlimited.
    pub step_budget: Option<u64>,
    /// Print each dispatched instruction to stderr.
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_max: DEFAULT_STACK_MAX,
            frames_max: DEFAULT_FRAMES_MAX,
            step_budget: None,
            trace: false,
        }
    }
}

/// Interpreter-wide configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Compile eligible function literals after parsing.
    pub vm_enabled: bool,
    /// Log compile/fallback decisions to stderr.
    pub vm_trace: bool,
    /// Nested calls allowed across both engines.
    pub max_depth: usize,
    pub vm: VmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vm_enabled: true,
            vm_trace: false,
            max_depth: DEFAULT_MAX_DEPTH,
            vm: VmConfig::default(),
        }
    }
}

impl Config {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(value) = lookup("JOLT_VM") {
            config.vm_enabled = !is_off(&value);
        }
        if let Some(value) = lookup("JOLT_VM_TRACE") {
            config.vm_trace = !is_off(&value);
        }
        config.vm.trace = cfg!(feature = "vm-trace") && config.vm_trace;

        config.max_depth = parse_or("JOLT_MAX_DEPTH", &lookup, DEFAULT_MAX_DEPTH);
        config.vm.stack_max = parse_or("JOLT_VM_STACK_MAX", &lookup, DEFAULT_STACK_MAX);
        config.vm.frames_max = parse_or("JOLT_VM_FRAMES_MAX", &lookup, config.max_depth + 1);
        if let Some(raw) = lookup("JOLT_VM_STEP_BUDGET") {
            match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => config.vm.step_budget = Some(n),
                _ => warn_invalid("JOLT_VM_STEP_BUDGET", &raw),
            }
        }

        config
    }
}

fn is_off(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}

fn parse_or<F>(key: &str, lookup: &F, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                warn_invalid(key, &raw);
                default
            }
        },
    }
}

fn warn_invalid(key: &str, raw: &str) {
    eprintln!(
        "{} ignoring invalid {}={:?}, using default",
        "warning:".yellow().bold(),
        key,
        raw
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert!(config.vm_enabled);
        assert_eq!(config.vm.stack_max, DEFAULT_STACK_MAX);
        assert_eq!(config.vm.frames_max, DEFAULT_FRAMES_MAX);
        assert_eq!(config.vm.step_budget, None);
    }

    #[test]
    fn test_vm_toggle() {
        assert!(!config_from(&[("JOLT_VM", "0")]).vm_enabled);
        assert!(!config_from(&[("JOLT_VM", "off")]).vm_enabled);
        assert!(config_from(&[("JOLT_VM", "1")]).vm_enabled);
    }

    #[test]
    fn test_limits_and_budget() {
        let config = config_from(&[
            ("JOLT_VM_FRAMES_MAX", "32"),
            ("JOLT_VM_STEP_BUDGET", "1000"),
            ("JOLT_MAX_DEPTH", "bogus"),
        ]);
        assert_eq!(config.vm.frames_max, 32);
        assert_eq!(config.vm.step_budget, Some(1000));
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_frame_limit_follows_call_depth() {
        let config = config_from(&[("JOLT_MAX_DEPTH", "100")]);
        assert_eq!(config.max_depth, 100);
        assert_eq!(config.vm.frames_max, 101);
        assert_eq!(Config::default().vm.frames_max, DEFAULT_MAX_DEPTH + 1);
    }
}
