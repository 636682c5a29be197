//! Single writer of the clicker and macro configuration.
//!
//! Every setter persists the whole affected group, then pushes the whole
//! group to the engine. The local copy is authoritative: a failed push is
//! logged and the next mutation (or [`ConfigStore::resync`]) sends
//! everything again.

use crate::engine::EngineClient;
use crate::storage::{keys, load_or_default, KeyValueStore, StorageResult};
use crate::{
    Binding, BindingRole, ClickMode, ClickerConfig, Coordinate, CoordinateTarget, MacroConfig,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub struct ConfigStore {
    store: Arc<dyn KeyValueStore>,
    engine: Arc<dyn EngineClient>,
    clicker: Mutex<ClickerConfig>,
    macros: Mutex<MacroConfig>,
}

impl ConfigStore {
    /// Load both groups from `store`, field by field.
    pub fn load(store: Arc<dyn KeyValueStore>, engine: Arc<dyn EngineClient>) -> Self {
        let clicker = load_clicker(store.as_ref());
        let macros = load_macro(store.as_ref());
        info!(?clicker, ?macros, "Configuration loaded");

        Self {
            store,
            engine,
            clicker: Mutex::new(clicker),
            macros: Mutex::new(macros),
        }
    }

    pub fn clicker(&self) -> ClickerConfig {
        self.clicker.lock().unwrap().clone()
    }

    pub fn macro_config(&self) -> MacroConfig {
        self.macros.lock().unwrap().clone()
    }

    pub async fn set_target_rate(&self, rate: u32) -> StorageResult<()> {
        self.update_clicker(|c| c.target_rate = ClickerConfig::clamp_rate(rate))
            .await
    }

    pub async fn set_jitter_magnitude(&self, jitter_ms: u32) -> StorageResult<()> {
        self.update_clicker(|c| c.jitter_magnitude = ClickerConfig::clamp_jitter(jitter_ms))
            .await
    }

    pub async fn set_humanization_enabled(&self, enabled: bool) -> StorageResult<()> {
        self.update_clicker(|c| c.humanization_enabled = enabled).await
    }

    pub async fn set_click_mode(&self, mode: ClickMode) -> StorageResult<()> {
        self.update_clicker(|c| c.click_mode = mode).await
    }

    pub async fn set_toggle_binding(&self, binding: Binding) -> StorageResult<()> {
        self.set_binding(BindingRole::Toggle, binding).await
    }

    /// Assign `binding` to `role`, routing to the group that owns the role.
    pub async fn set_binding(&self, role: BindingRole, binding: Binding) -> StorageResult<()> {
        if !binding.is_engine_supported() {
            warn!(%role, %binding, "Engine cannot detect this binding; storing it anyway");
        }

        match role {
            BindingRole::Toggle => self.update_clicker(|c| c.toggle_binding = binding).await,
            BindingRole::MacroPart1 => self.update_macro(|m| m.part1_binding = binding).await,
            BindingRole::MacroPart2 => self.update_macro(|m| m.part2_binding = binding).await,
            BindingRole::Dodge => self.update_macro(|m| m.dodge_binding = binding).await,
        }
    }

    pub async fn set_coordinate(
        &self,
        target: CoordinateTarget,
        coordinate: Coordinate,
    ) -> StorageResult<()> {
        self.update_macro(|m| match target {
            CoordinateTarget::SafePocket => m.safe_pocket = coordinate,
            CoordinateTarget::QuickUse => m.quick_use = coordinate,
        })
        .await
    }

    pub async fn set_step_delay(&self, delay_ms: u32) -> StorageResult<()> {
        self.update_macro(|m| m.step_delay_ms = MacroConfig::snap_step_delay(delay_ms))
            .await
    }

    /// Push both full snapshots, e.g. once the engine connection is up.
    pub async fn resync(&self) {
        let clicker = self.clicker();
        let macros = self.macro_config();
        self.push_clicker(&clicker).await;
        self.push_macro(&macros).await;
        info!("Configuration resynced to engine");
    }

    async fn update_clicker(&self, mutate: impl FnOnce(&mut ClickerConfig)) -> StorageResult<()> {
        let (snapshot, persisted) = {
            let mut clicker = self.clicker.lock().unwrap();
            mutate(&mut clicker);
            (clicker.clone(), persist_clicker(self.store.as_ref(), &clicker))
        };
        if let Err(e) = &persisted {
            warn!(error = %e, "Failed to persist clicker config");
        }
        self.push_clicker(&snapshot).await;
        persisted
    }

    async fn update_macro(&self, mutate: impl FnOnce(&mut MacroConfig)) -> StorageResult<()> {
        let (snapshot, persisted) = {
            let mut macros = self.macros.lock().unwrap();
            mutate(&mut macros);
            (macros.clone(), persist_macro(self.store.as_ref(), &macros))
        };
        if let Err(e) = &persisted {
            warn!(error = %e, "Failed to persist macro config");
        }
        self.push_macro(&snapshot).await;
        persisted
    }

    async fn push_clicker(&self, config: &ClickerConfig) {
        match self.engine.update_config(config).await {
            Ok(()) => debug!(?config, "Clicker config pushed"),
            Err(e) => warn!(error = %e, "Failed to push clicker config"),
        }
    }

    async fn push_macro(&self, config: &MacroConfig) {
        match self.engine.update_macro_config(config).await {
            Ok(()) => debug!(?config, "Macro config pushed"),
            Err(e) => warn!(error = %e, "Failed to push macro config"),
        }
    }
}

fn load_clicker(store: &dyn KeyValueStore) -> ClickerConfig {
    let defaults = ClickerConfig::default();
    ClickerConfig {
        target_rate: ClickerConfig::clamp_rate(load_or_default(
            store,
            keys::TARGET_RATE,
            defaults.target_rate,
        )),
        jitter_magnitude: ClickerConfig::clamp_jitter(load_or_default(
            store,
            keys::JITTER,
            defaults.jitter_magnitude,
        )),
        humanization_enabled: load_or_default(
            store,
            keys::HUMANIZATION,
            defaults.humanization_enabled,
        ),
        toggle_binding: load_or_default(store, keys::TOGGLE_BINDING, defaults.toggle_binding),
        click_mode: load_or_default(store, keys::CLICK_MODE, defaults.click_mode),
    }
}

fn load_macro(store: &dyn KeyValueStore) -> MacroConfig {
    let defaults = MacroConfig::default();
    MacroConfig {
        part1_binding: load_or_default(store, keys::MACRO_PART1, defaults.part1_binding),
        part2_binding: load_or_default(store, keys::MACRO_PART2, defaults.part2_binding),
        dodge_binding: load_or_default(store, keys::MACRO_DODGE, defaults.dodge_binding),
        safe_pocket: load_or_default(store, keys::MACRO_SAFE_POCKET, defaults.safe_pocket),
        quick_use: load_or_default(store, keys::MACRO_QUICK_USE, defaults.quick_use),
        step_delay_ms: MacroConfig::snap_step_delay(load_or_default(
            store,
            keys::MACRO_DELAY,
            defaults.step_delay_ms,
        )),
    }
}

fn persist_clicker(store: &dyn KeyValueStore, config: &ClickerConfig) -> StorageResult<()> {
    store.set_all(vec![
        entry(keys::TARGET_RATE, &config.target_rate)?,
        entry(keys::JITTER, &config.jitter_magnitude)?,
        entry(keys::HUMANIZATION, &config.humanization_enabled)?,
        entry(keys::TOGGLE_BINDING, &config.toggle_binding)?,
        entry(keys::CLICK_MODE, &config.click_mode)?,
    ])
}

fn persist_macro(store: &dyn KeyValueStore, config: &MacroConfig) -> StorageResult<()> {
    store.set_all(vec![
        entry(keys::MACRO_PART1, &config.part1_binding)?,
        entry(keys::MACRO_PART2, &config.part2_binding)?,
        entry(keys::MACRO_DODGE, &config.dodge_binding)?,
        entry(keys::MACRO_SAFE_POCKET, &config.safe_pocket)?,
        entry(keys::MACRO_QUICK_USE, &config.quick_use)?,
        entry(keys::MACRO_DELAY, &config.step_delay_ms)?,
    ])
}

fn entry<T: serde::Serialize>(key: &str, value: &T) -> StorageResult<(String, String)> {
    Ok((key.to_string(), serde_json::to_string(value)?))
}
