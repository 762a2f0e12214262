//! Store factory and strategy selection
//!
//! Selection order:
//! 1. `strategy` set explicitly: use it
//! 2. `compress` override: `true` → compressed, `false` → plain
//! 3. otherwise by profile: memory-optimized → compressed, standard → plain

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{Config, Profile};
use crate::intern::Interner;
use crate::store::{CompressedLayout, FrozenStore, PlainLayout, TextStore, ValueCompactLayout};

/// How a store represents its keys and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Keys and values as plain text: most memory, cheapest reads
    Plain,
    /// Plain keys, values in byte form decoded per read
    ValueCompact,
    /// Interned compressed keys and byte-form values: least memory
    Compressed,
}

impl Strategy {
    /// Canonical name, as accepted by `dictstore.strategy`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Plain => "plain",
            Strategy::ValueCompact => "value-compact",
            Strategy::Compressed => "compressed",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Strategy::Plain),
            "value-compact" | "value_compact" | "value" => Ok(Strategy::ValueCompact),
            "compressed" => Ok(Strategy::Compressed),
            other => Err(format!("unknown strategy `{}`", other)),
        }
    }
}

/// Pick the strategy a store built under `config` should use.
pub fn select_strategy(config: &Config) -> Strategy {
    if let Some(strategy) = config.strategy {
        return strategy;
    }
    match (config.compress, config.profile) {
        (Some(true), _) => Strategy::Compressed,
        (Some(false), _) => Strategy::Plain,
        (None, Profile::MemoryOptimized) => Strategy::Compressed,
        (None, Profile::Standard) => Strategy::Plain,
    }
}

/// Builds immutable stores from finished key/value maps.
#[derive(Debug, Clone)]
pub struct StoreFactory {
    config: Config,
    interner: Arc<Interner>,
}

impl StoreFactory {
    /// Factory whose compressed stores share the process-wide interning table.
    pub fn new(config: Config) -> Self {
        Self::with_interner(config, Interner::global())
    }

    /// Factory whose compressed stores intern into `interner`.
    pub fn with_interner(config: Config, interner: Arc<Interner>) -> Self {
        Self { config, interner }
    }

    /// Factory with a private interning table tuned by `config.interner`.
    pub fn isolated(config: Config) -> Self {
        let interner = Arc::new(Interner::with_config(&config.interner));
        Self::with_interner(config, interner)
    }

    /// The configuration driving selection.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The interning table used by compressed stores.
    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// The strategy `build` will use.
    pub fn strategy(&self) -> Strategy {
        select_strategy(&self.config)
    }

    /// Build a store with the configured strategy.
    pub fn build<I, K, V>(&self, entries: I) -> Arc<dyn TextStore>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.build_with(self.strategy(), entries)
    }

    /// Build a store with an explicit strategy, bypassing selection.
    pub fn build_with<I, K, V>(&self, strategy: Strategy, entries: I) -> Arc<dyn TextStore>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        match strategy {
            Strategy::Plain => Arc::new(FrozenStore::build(PlainLayout, entries)),
            Strategy::ValueCompact => Arc::new(FrozenStore::build(ValueCompactLayout, entries)),
            Strategy::Compressed => Arc::new(FrozenStore::build(
                CompressedLayout::new(Arc::clone(&self.interner)),
                entries,
            )),
        }
    }
}

impl Default for StoreFactory {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertySource;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let source: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_source(&source as &dyn PropertySource)
    }

    #[test]
    fn test_profile_defaults() {
        assert_eq!(select_strategy(&Config::server()), Strategy::Plain);
        assert_eq!(select_strategy(&Config::phone()), Strategy::Compressed);
        assert_eq!(select_strategy(&Config::budget()), Strategy::Compressed);
    }

    #[test]
    fn test_compress_override_wins_over_profile() {
        let mut config = Config::phone();
        config.compress = Some(false);
        assert_eq!(select_strategy(&config), Strategy::Plain);

        let mut config = Config::server();
        config.compress = Some(true);
        assert_eq!(select_strategy(&config), Strategy::Compressed);
    }

    #[test]
    fn test_explicit_strategy_wins() {
        let mut config = Config::server();
        config.compress = Some(true);
        config.strategy = Some(Strategy::ValueCompact);
        assert_eq!(select_strategy(&config), Strategy::ValueCompact);
    }

    #[test]
    fn test_unparseable_override_falls_back_to_profile() {
        let config = config_from(&[("dictstore.profile", "budget"), ("dictstore.compress", "maybe")]);
        assert_eq!(select_strategy(&config), Strategy::Compressed);

        let config = config_from(&[("dictstore.compress", "1")]);
        assert_eq!(select_strategy(&config), Strategy::Plain);
    }

    #[test]
    fn test_strategy_names_round_trip() {
        for strategy in [Strategy::Plain, Strategy::ValueCompact, Strategy::Compressed] {
            assert_eq!(strategy.as_str().parse::<Strategy>(), Ok(strategy));
            assert_eq!(strategy.to_string(), strategy.as_str());
        }
        assert!("gzip".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_compact_is_not_a_compressed_alias() {
        assert!("compact".parse::<Strategy>().is_err());
        assert_eq!("value-compact".parse::<Strategy>(), Ok(Strategy::ValueCompact));
        assert_eq!(" Compressed ".parse::<Strategy>(), Ok(Strategy::Compressed));
    }

    #[test]
    fn test_isolated_with_oversized_shards() {
        let mut config = Config::budget();
        config.interner.shards = usize::MAX;
        let factory = StoreFactory::isolated(config);
        let store = factory.build([("a.b", "c")]);
        assert_eq!(store.get("a.b").as_deref(), Some("c"));
    }

    #[test]
    fn test_factory_builds_selected_strategy() {
        let factory = StoreFactory::isolated(Config::budget());
        let store = factory.build([("admin.title", "Administration")]);
        assert_eq!(store.strategy(), Strategy::Compressed);
        assert_eq!(store.get("admin.title").as_deref(), Some("Administration"));
        assert_eq!(factory.interner().len(), 2);

        let store = factory.build_with(Strategy::Plain, [("admin.title", "Administration")]);
        assert_eq!(store.strategy(), Strategy::Plain);
    }

    #[test]
    fn test_isolated_factory_uses_configured_table() {
        let mut config = Config::phone();
        config.interner.shards = 2;
        let a = StoreFactory::isolated(config.clone());
        let b = StoreFactory::isolated(config);
        assert!(!Arc::ptr_eq(a.interner(), b.interner()));
    }

    #[test]
    fn test_default_factory_shares_global_table() {
        let factory = StoreFactory::default();
        assert!(Arc::ptr_eq(factory.interner(), &Interner::global()));
        assert_eq!(factory.strategy(), Strategy::Plain);
    }
}
