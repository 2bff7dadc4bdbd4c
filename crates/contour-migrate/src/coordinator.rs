use std::fmt;
use std::sync::Arc;

use contour_router::{ContentRouter, RoutingContext, RoutingPolicy};
use contour_store::{BackingStore, StoreError, StoreHandle, WriteContext};
use contour_types::{ContentData, NodeRef, PropertyMap, PropertyValue, QName, RoutingCriteria};

use crate::error::{HostResult, MigrationError, MigrationResult};
use crate::event::LifecycleEvent;
use crate::host::NodeService;
use crate::initializer::ContextInitializer;
use crate::scope::SiteModel;
use crate::transaction::{MigrationRecord, TransactionHooks};
use crate::trigger::{MigrationCandidate, MigrationTrigger, TriggerContext};

/// What one [`MigrationCoordinator::handle`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub nodes_evaluated: usize,
    /// Nodes skipped because migration is switched off for them.
    pub nodes_disabled: usize,
    /// Content values whose bytes were copied to the target store.
    pub copied: usize,
    /// Content values repointed at a copy the target already held.
    pub relinked: usize,
    pub unchanged: usize,
    /// Content values not owned by the router.
    pub unmanaged: usize,
}

impl MigrationReport {
    /// Number of content values whose persisted address changed.
    pub fn moved(&self) -> usize {
        self.copied + self.relinked
    }
}

/// Everything fixed while migrating the values of one node.
struct NodeMigration<'a> {
    node: &'a NodeRef,
    target: &'a StoreHandle,
    criteria: &'a RoutingCriteria,
    hooks: &'a dyn TransactionHooks,
}

/// Moves content to the store its node's current routing criteria select.
///
/// Properties are rewritten with one batched
/// [`add_properties`](NodeService::add_properties) call per node, after
/// every copy for that node succeeded. Newly written objects are registered
/// with the transaction for deletion on rollback.
pub struct MigrationCoordinator<P> {
    router: Arc<ContentRouter<P>>,
    nodes: Arc<dyn NodeService>,
    site_model: SiteModel,
    policy_initializers: Vec<Box<dyn ContextInitializer>>,
    extra_initializers: Vec<Box<dyn ContextInitializer>>,
}

impl<P: MigrationTrigger> MigrationCoordinator<P> {
    pub fn new(router: Arc<ContentRouter<P>>, nodes: Arc<dyn NodeService>) -> Self {
        let site_model = SiteModel::default();
        let policy_initializers = router.policy().initializers(&site_model);
        Self {
            router,
            nodes,
            site_model,
            policy_initializers,
            extra_initializers: Vec::new(),
        }
    }

    pub fn with_site_model(mut self, site_model: SiteModel) -> Self {
        self.policy_initializers = self.router.policy().initializers(&site_model);
        self.site_model = site_model;
        self
    }

    /// Run `initializer` after the policy's own initializers.
    pub fn with_initializer(mut self, initializer: impl ContextInitializer + 'static) -> Self {
        self.extra_initializers.push(Box::new(initializer));
        self
    }

    pub fn router(&self) -> &Arc<ContentRouter<P>> {
        &self.router
    }

    /// React to a lifecycle event inside the transaction behind `hooks`.
    ///
    /// On error no property of the failing node has been rewritten; every
    /// object opened for a copy, finished or not, is left to the rollback
    /// deletions.
    pub fn handle(
        &self,
        event: &LifecycleEvent,
        hooks: &dyn TransactionHooks,
    ) -> MigrationResult<MigrationReport> {
        let ctx = TriggerContext {
            nodes: self.nodes.as_ref(),
            site_model: &self.site_model,
        };
        let candidates = self.router.policy().candidates(event, ctx)?;
        tracing::debug!(
            event = event.kind(),
            node = %event.node(),
            policy = self.router.policy().name(),
            candidates = candidates.len(),
            "evaluating lifecycle event"
        );

        let mut report = MigrationReport::default();
        for candidate in &candidates {
            self.migrate_node(candidate, hooks, &mut report)?;
        }
        Ok(report)
    }

    fn migrate_node(
        &self,
        candidate: &MigrationCandidate,
        hooks: &dyn TransactionHooks,
        report: &mut MigrationReport,
    ) -> MigrationResult<()> {
        let node = &candidate.node;
        report.nodes_evaluated += 1;

        let properties = self.nodes.properties(node)?;
        if !self.migration_enabled(&properties) {
            tracing::trace!(node = %node, "migration disabled for node");
            report.nodes_disabled += 1;
            return Ok(());
        }

        let criteria = self.criteria_for(candidate)?;
        let _scope = RoutingContext::enter(criteria.clone());
        let target = self.router.select_move_target(&criteria);
        let admitted = self.router.policy().migrated_properties();
        let step = NodeMigration {
            node,
            target: &target,
            criteria: &criteria,
            hooks,
        };

        let mut updates = PropertyMap::new();
        for (name, value) in &properties {
            if !value.holds_content() || !admitted.admits(Some(name)) {
                continue;
            }
            if let Some(rewritten) = self.migrate_value(&step, name, value, report)? {
                updates.insert(name.clone(), rewritten);
            }
        }

        if !updates.is_empty() {
            tracing::debug!(
                node = %node,
                store = target.name(),
                properties = updates.len(),
                "rewriting migrated content properties"
            );
            self.nodes.add_properties(node, updates)?;
        }
        Ok(())
    }

    /// An explicit boolean on the node wins over the policy default.
    fn migration_enabled(&self, properties: &PropertyMap) -> bool {
        let settings = self.router.policy().migration_settings();
        settings
            .override_property
            .as_ref()
            .and_then(|name| properties.get(name))
            .and_then(PropertyValue::as_bool)
            .unwrap_or(settings.migrate_on_change)
    }

    fn criteria_for(&self, candidate: &MigrationCandidate) -> HostResult<RoutingCriteria> {
        let mut criteria = RoutingContext::current();
        for initializer in self.policy_initializers.iter().chain(&self.extra_initializers) {
            initializer.initialize(self.nodes.as_ref(), &candidate.node, &mut criteria)?;
        }
        candidate.apply(&mut criteria);
        Ok(criteria)
    }

    /// Migrate a (possibly multi-valued) property value. `None` if nothing
    /// in it changed.
    fn migrate_value(
        &self,
        step: &NodeMigration<'_>,
        property: &QName,
        value: &PropertyValue,
        report: &mut MigrationReport,
    ) -> MigrationResult<Option<PropertyValue>> {
        match value {
            PropertyValue::Content(data) => Ok(self
                .migrate_content(step, property, data, report)?
                .map(PropertyValue::Content)),
            PropertyValue::List(values) => {
                let mut changed = false;
                let mut rewritten = Vec::with_capacity(values.len());
                for entry in values {
                    match self.migrate_value(step, property, entry, report)? {
                        Some(entry) => {
                            changed = true;
                            rewritten.push(entry);
                        }
                        None => rewritten.push(entry.clone()),
                    }
                }
                Ok(changed.then_some(PropertyValue::List(rewritten)))
            }
            _ => Ok(None),
        }
    }

    /// Relocate one content value to the step's target store.
    fn migrate_content(
        &self,
        step: &NodeMigration<'_>,
        property: &QName,
        data: &ContentData,
        report: &mut MigrationReport,
    ) -> MigrationResult<Option<ContentData>> {
        let current = &data.address;
        let target = step.target;
        let fail = |err: StoreError| MigrationError::storage(step.node, property, err);

        let owner = match self.router.resolve(current, true) {
            Ok(Some(owner)) => owner,
            Ok(None) | Err(StoreError::UnsupportedAddress(_)) => {
                tracing::trace!(address = %current, "content not managed by this router");
                report.unmanaged += 1;
                return Ok(None);
            }
            Err(err) => return Err(fail(err)),
        };

        let wildcard = current.to_wildcard();
        let wildcard_base = wildcard.base().map_err(|err| fail(err.into()))?;
        let mut probes = vec![&wildcard];
        if wildcard_base != wildcard {
            probes.push(&wildcard_base);
        }
        for probe in probes {
            if !target.supports_address(probe) || !target.exists(probe).map_err(fail)? {
                continue;
            }
            let reader = target.read(probe).map_err(fail)?;
            if reader.address() == current {
                tracing::trace!(address = %current, store = target.name(), "content already in place");
                report.unchanged += 1;
                return Ok(None);
            }
            tracing::debug!(
                from = %current,
                to = %reader.address(),
                store = target.name(),
                "relinking to content already held by target"
            );
            report.relinked += 1;
            return Ok(Some(data.relocated(reader.address().clone())));
        }

        if !current.has_prefixes()
            && target.supports_address(current)
            && target.exists(current).map_err(fail)?
        {
            report.unchanged += 1;
            return Ok(None);
        }

        let reader = owner.read(current).map_err(fail)?;
        let content = reader.content().clone();
        let mut context = WriteContext::new()
            .for_property(step.node.clone(), property.clone())
            .with_existing_reader(reader)
            .with_criteria(step.criteria.clone());
        if let Some(requested) = [&wildcard, &wildcard_base, current]
            .into_iter()
            .find(|address| target.supports_address(address))
        {
            context = context.with_address(requested.clone());
        }
        let writer = target.write(&context).map_err(fail)?;
        let new_address = writer.address().clone();
        let relocated = &new_address != current;
        if relocated {
            step.hooks.register_rollback_deletion(
                Arc::clone(target),
                MigrationRecord {
                    node: step.node.clone(),
                    property: property.clone(),
                    old_address: current.clone(),
                    new_address: new_address.clone(),
                },
            );
        }
        let written = writer.put_content(content).map_err(fail)?;
        self.router
            .resolver()
            .record_owner(&new_address, Arc::clone(target));
        report.copied += 1;
        tracing::debug!(
            from = %current,
            to = %new_address,
            store = target.name(),
            bytes = written,
            "copied content to target store"
        );

        Ok(relocated.then(|| data.relocated(new_address)))
    }
}

impl<P: RoutingPolicy> fmt::Debug for MigrationCoordinator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationCoordinator")
            .field("router", &self.router.name())
            .field("site_model", &self.site_model)
            .field(
                "initializers",
                &(self.policy_initializers.len() + self.extra_initializers.len()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryNodeService;
    use crate::transaction::LocalTransaction;
    use contour_router::{
        MigrationSettings, RouterConfig, SelectorPolicy, SelectorPolicyConfig, StoreCatalog,
    };
    use contour_store::InMemoryBackingStore;
    use contour_types::ContentAddress;

    struct Fixture {
        fallback: Arc<InMemoryBackingStore>,
        hot: Arc<InMemoryBackingStore>,
        nodes: Arc<InMemoryNodeService>,
        coordinator: MigrationCoordinator<SelectorPolicy>,
    }

    fn class() -> QName {
        QName::new("my:class")
    }

    fn fixture(migration: MigrationSettings) -> Fixture {
        let fallback = Arc::new(InMemoryBackingStore::new("fallback", "store-f"));
        let hot = Arc::new(InMemoryBackingStore::new("hot", "store-h"));
        let catalog = StoreCatalog::new()
            .with("fallback", fallback.clone())
            .unwrap()
            .with("hot", hot.clone())
            .unwrap();
        let config = SelectorPolicyConfig {
            selector_property: class(),
            value_stores: [("hot".to_string(), "hot".to_string())].into(),
            fallback_store: "fallback".to_string(),
            route_properties: None,
            migration,
        };
        let policy = SelectorPolicy::from_config(&config, &catalog).unwrap();
        let router = Arc::new(ContentRouter::new(policy, &RouterConfig::default()));
        let nodes = Arc::new(InMemoryNodeService::new());
        let coordinator = MigrationCoordinator::new(router, nodes.clone());
        Fixture {
            fallback,
            hot,
            nodes,
            coordinator,
        }
    }

    fn write(router: &ContentRouter<SelectorPolicy>, bytes: &'static [u8]) -> ContentData {
        let writer = router.write(&WriteContext::new()).unwrap();
        let address = writer.address().clone();
        let size = writer.put_content(bytes.into()).unwrap();
        ContentData::new(address, size).with_mimetype("text/plain")
    }

    fn reclassify(f: &Fixture, node: &NodeRef, to: &str) -> LifecycleEvent {
        let before = f.nodes.properties(node).unwrap();
        f.nodes
            .set_property(node, class(), PropertyValue::Text(to.to_string()))
            .unwrap();
        LifecycleEvent::PropertiesUpdated {
            node: node.clone(),
            before,
            after: f.nodes.properties(node).unwrap(),
        }
    }

    // -----------------------------------------------------------------------
    // Per-node switches
    // -----------------------------------------------------------------------

    #[test]
    fn node_override_disables_migration() {
        let override_property = QName::new("my:migrate");
        let f = fixture(MigrationSettings::enabled().with_override_property(override_property.clone()));
        let node = f.nodes.create_node(QName::new("cm:content"), None);
        let data = write(f.coordinator.router(), b"payload");
        f.nodes
            .set_property(&node, QName::new("cm:content"), PropertyValue::Content(data.clone()))
            .unwrap();
        f.nodes
            .set_property(&node, override_property, PropertyValue::Boolean(false))
            .unwrap();

        let event = reclassify(&f, &node, "hot");
        let report = f.coordinator.handle(&event, &LocalTransaction::new()).unwrap();

        assert_eq!(report.nodes_disabled, 1);
        assert_eq!(report.moved(), 0);
        assert!(f.hot.is_empty());
        assert_eq!(
            f.nodes.property(&node, &QName::new("cm:content")).unwrap(),
            Some(PropertyValue::Content(data))
        );
    }

    #[test]
    fn disabled_by_default() {
        let f = fixture(MigrationSettings::default());
        let node = f.nodes.create_node(QName::new("cm:content"), None);
        let data = write(f.coordinator.router(), b"payload");
        f.nodes
            .set_property(&node, QName::new("cm:content"), PropertyValue::Content(data))
            .unwrap();

        let event = reclassify(&f, &node, "hot");
        let report = f.coordinator.handle(&event, &LocalTransaction::new()).unwrap();
        assert_eq!(report.nodes_disabled, 1);
        assert_eq!(f.nodes.property_writes(), 0);
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    #[test]
    fn foreign_content_is_unmanaged() {
        let f = fixture(MigrationSettings::enabled());
        let node = f.nodes.create_node(QName::new("cm:content"), None);
        let foreign = ContentData::new(ContentAddress::parse("s3://bucket/key").unwrap(), 3);
        f.nodes
            .set_property(&node, QName::new("cm:content"), PropertyValue::Content(foreign))
            .unwrap();

        let event = reclassify(&f, &node, "hot");
        let report = f.coordinator.handle(&event, &LocalTransaction::new()).unwrap();
        assert_eq!(report.unmanaged, 1);
        assert_eq!(f.nodes.property_writes(), 0);
    }

    #[test]
    fn list_values_migrate_per_entry() {
        let f = fixture(MigrationSettings::enabled());
        let node = f.nodes.create_node(QName::new("cm:content"), None);
        let first = write(f.coordinator.router(), b"one");
        let second = write(f.coordinator.router(), b"two");
        let list = PropertyValue::List(vec![
            PropertyValue::Content(first.clone()),
            PropertyValue::Text("note".into()),
            PropertyValue::Content(second.clone()),
        ]);
        f.nodes
            .set_property(&node, QName::new("my:renditions"), list)
            .unwrap();

        let event = reclassify(&f, &node, "hot");
        let tx = LocalTransaction::new();
        let report = f.coordinator.handle(&event, &tx).unwrap();

        assert_eq!(report.copied, 2);
        assert_eq!(f.hot.len(), 2);
        assert_eq!(tx.pending_records().len(), 2);
        let Some(PropertyValue::List(entries)) =
            f.nodes.property(&node, &QName::new("my:renditions")).unwrap()
        else {
            panic!("list property lost");
        };
        assert_eq!(entries[1], PropertyValue::Text("note".into()));
        for (entry, original) in [(&entries[0], &first), (&entries[2], &second)] {
            let data = entry.as_content().unwrap();
            assert_eq!(data.address.prefixes().unwrap(), vec!["selector", "hot"]);
            assert_eq!(data.mimetype, original.mimetype);
            assert_eq!(data.size, original.size);
        }
        assert_eq!(f.fallback.len(), 2);
    }
}
