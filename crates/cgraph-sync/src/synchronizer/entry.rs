//! Saving single framework, concept and law records.

use std::collections::BTreeMap;

use cgraph_core::schema::{LinkRelation, LinkTable};
use cgraph_core::{
    ClientId, Concept, ConceptId, EntityKind, Framework, FrameworkId, Law, LawId,
};
use cgraph_storage::RecordStore;

use crate::error::SyncError;
use crate::loader::{general_frameworks, load, RootSelector};
use crate::remap::{DanglingPolicy, PointerSite, Remapper};
use crate::snapshot::{
    apply, ConceptPatch, EntryPatch, EntrySubmission, FrameworkPatch, LawPatch, Patch,
};
use crate::view::{ConceptView, EntrySet, FrameworkView, LawView};

use super::{
    concepts_bound_under, exists_in, link_table, remove_unbound_concepts, EntrySaved, Links,
};

pub(super) fn delete<S: RecordStore>(
    store: &mut S,
    kind: EntityKind,
    id: i64,
) -> Result<EntrySaved, SyncError> {
    // Bindings go with the cascade; remember who was bound first.
    let mut bound = Vec::new();
    match kind {
        EntityKind::Law => bound = concepts_bound_under(&*store, LawId(id))?,
        EntityKind::Framework => {
            for law in store.find_laws_by_framework(FrameworkId(id))? {
                bound.extend(concepts_bound_under(&*store, law.id)?);
            }
        }
        _ => {}
    }
    store.delete(kind, id)?;
    let removed_concepts = remove_unbound_concepts(store, bound)?;
    Ok(EntrySaved {
        table: kind,
        id,
        deleted: true,
        entries: EntrySet::default(),
        id_map: Default::default(),
        removed_concepts,
        dangling: Vec::new(),
    })
}

pub(super) fn upsert<S: RecordStore>(
    store: &mut S,
    submission: &EntrySubmission,
    kind: EntityKind,
    patch: EntryPatch,
    policy: DanglingPolicy,
) -> Result<EntrySaved, SyncError> {
    let mut remap = Remapper::new(policy);
    let client = submission.id;
    let id = match patch {
        EntryPatch::Framework(patch) => save_framework(store, &mut remap, client, patch)?,
        EntryPatch::Concept(patch) => save_concept(store, &mut remap, client, patch)?,
        EntryPatch::Law(patch) => save_law(store, &mut remap, client, patch)?,
    };

    let mut eager = Vec::new();
    if let Some(dependencies) = &submission.dependencies {
        let table = link_table(kind, LinkRelation::DependsOn)?;
        eager = save_links(store, &mut remap, table, id, dependencies)?;
    }
    if let Some(instance_of) = &submission.instance_of {
        let table = link_table(kind, LinkRelation::InstanceOf)?;
        save_links(store, &mut remap, table, id, instance_of)?;
    }

    let old_id = client.filter(|c| c.0 != id);
    let mut entries = EntrySet::default();
    match kind {
        EntityKind::Framework => {
            let general = general_frameworks(&*store)?;
            let framework = store.get_framework(FrameworkId(id))?;
            let mut view = FrameworkView::build(&*store, framework, &general)?;
            view.old_id = old_id;
            entries.framework.insert(view.id, view);
            for dependency in eager {
                let graph = load(&*store, &RootSelector::framework(FrameworkId(dependency)))?;
                entries.merge(graph.into_entries());
            }
        }
        EntityKind::Concept => {
            let concept = store.get_concept(ConceptId(id))?;
            let mut view = ConceptView::build(&*store, concept)?;
            view.old_id = old_id;
            entries.concept.insert(view.id, view);
        }
        EntityKind::Law => {
            let law = store.get_law(LawId(id))?;
            let mut view = LawView::build(&*store, law)?;
            view.old_id = old_id;
            entries.law.insert(view.id, view);
        }
        EntityKind::Node => {
            return Err(SyncError::Validation(
                "nodes are saved through their law's relation".to_string(),
            ))
        }
    }

    let (id_map, dangling) = remap.into_parts();
    Ok(EntrySaved {
        table: kind,
        id,
        deleted: false,
        entries,
        id_map,
        removed_concepts: Vec::new(),
        dangling,
    })
}

fn save_framework<S: RecordStore>(
    store: &mut S,
    remap: &mut Remapper,
    client: Option<ClientId>,
    patch: FrameworkPatch,
) -> Result<i64, SyncError> {
    remap.assign(EntityKind::Framework, client, |target| match target {
        Some(id) => {
            let mut framework = store.get_framework(FrameworkId(id))?;
            apply(&mut framework.name, patch.name);
            apply(&mut framework.description, patch.description);
            store.update_framework(&framework)?;
            Ok(id)
        }
        None => {
            let framework = Framework {
                id: FrameworkId(0),
                name: patch.name.unwrap_or_default(),
                description: patch.description.flatten(),
            };
            Ok(store.insert_framework(&framework)?.0)
        }
    })
}

/// Resolves a framework pointer patch; `None` leaves the field unchanged.
fn resolve_framework<S: RecordStore>(
    store: &S,
    remap: &mut Remapper,
    site: PointerSite,
    patch: Patch<ClientId>,
) -> Result<Patch<FrameworkId>, SyncError> {
    let Some(target) = patch else {
        return Ok(None);
    };
    let resolved = remap.resolve(
        site,
        EntityKind::Framework,
        target,
        exists_in(store, EntityKind::Framework),
    )?;
    Ok(Some(resolved.map(FrameworkId)))
}

fn save_concept<S: RecordStore>(
    store: &mut S,
    remap: &mut Remapper,
    client: Option<ClientId>,
    mut patch: ConceptPatch,
) -> Result<i64, SyncError> {
    let table = EntityKind::Concept.table();
    let owner = client.map_or(0, |c| c.0);
    let framework = resolve_framework(
        &*store,
        remap,
        PointerSite::new(table, owner, "framework"),
        patch.framework,
    )?;

    let id = remap.assign(EntityKind::Concept, client, |target| {
        let mut concept = match target {
            Some(id) => store.get_concept(ConceptId(id))?,
            None => Concept::new(String::new(), None),
        };
        apply(&mut concept.name, patch.name.take());
        apply(&mut concept.description, patch.description.take());
        apply(&mut concept.framework, framework);
        apply(&mut concept.symmetric, patch.symmetric);
        apply(&mut concept.node_specific, patch.node_specific);
        apply(&mut concept.law_specific, patch.law_specific);
        apply(&mut concept.inherits, patch.inherits);
        apply(&mut concept.symbol, patch.symbol.take());
        apply(&mut concept.commands, patch.commands.take());
        apply(&mut concept.value, patch.value.take());
        match target {
            Some(id) => {
                store.update_concept(&concept)?;
                Ok(id)
            }
            None => Ok(store.insert_concept(&concept)?.0),
        }
    })?;

    // head/reference go in after the body so a concept may point at itself.
    if patch.head.is_some() || patch.reference.is_some() {
        let current = store.get_concept(ConceptId(id))?;
        let stored = Links {
            head: current.head.map(|c| c.0),
            reference: current.reference.map(|c| c.0),
        };
        let links = Links::relink(EntityKind::Concept, stored, |field, stored| {
            let Some(target) = patch.pointer(field.name) else {
                return Ok(stored);
            };
            let kind = field.target().unwrap_or(EntityKind::Concept);
            remap.resolve(
                PointerSite::new(table, id, field.name),
                kind,
                target,
                exists_in(&*store, kind),
            )
        })?;
        store.set_concept_links(
            ConceptId(id),
            links.head.map(ConceptId),
            links.reference.map(ConceptId),
        )?;
    }
    Ok(id)
}

fn save_law<S: RecordStore>(
    store: &mut S,
    remap: &mut Remapper,
    client: Option<ClientId>,
    patch: LawPatch,
) -> Result<i64, SyncError> {
    let owner = client.map_or(0, |c| c.0);
    let framework = resolve_framework(
        &*store,
        remap,
        PointerSite::new(EntityKind::Law.table(), owner, "framework"),
        patch.framework,
    )?;

    remap.assign(EntityKind::Law, client, |target| {
        let mut law = match target {
            Some(id) => store.get_law(LawId(id))?,
            None => Law::new(String::new(), None),
        };
        apply(&mut law.name, patch.name);
        apply(&mut law.description, patch.description);
        apply(&mut law.framework, framework);
        apply(&mut law.hashtags, patch.hashtags);
        match target {
            Some(id) => {
                store.update_law(&law)?;
                Ok(id)
            }
            None => Ok(store.insert_law(&law)?.0),
        }
    })
}

/// Replaces the links of `owner` in `table` with the submitted targets.
///
/// Empty keys and unresolvable targets are skipped, as are the `General`
/// frameworks, which every framework depends on implicitly. Returns the
/// targets flagged for eager loading.
fn save_links<S: RecordStore>(
    store: &mut S,
    remap: &mut Remapper,
    table: &'static LinkTable,
    owner: i64,
    submitted: &BTreeMap<String, bool>,
) -> Result<Vec<i64>, SyncError> {
    let implicit: Vec<i64> = if table.target == EntityKind::Framework {
        general_frameworks(&*store)?.into_iter().map(|f| f.0).collect()
    } else {
        Vec::new()
    };

    let mut targets = Vec::new();
    let mut eager = Vec::new();
    for (client, load) in EntrySubmission::parse_keys(submitted)? {
        let site = PointerSite::new(table.name, owner, table.target_column);
        let resolved = remap.resolve(
            site,
            table.target,
            Some(client),
            exists_in(&*store, table.target),
        )?;
        let Some(target) = resolved else {
            continue;
        };
        if implicit.contains(&target) || targets.contains(&target) {
            continue;
        }
        targets.push(target);
        if load {
            eager.push(target);
        }
    }

    store.replace_links(table, owner, &targets)?;
    tracing::debug!(table = table.name, owner, links = targets.len(), "links replaced");
    Ok(eager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synchronizer::{SyncOptions, Synchronizer};
    use crate::RelationSnapshot;
    use cgraph_core::schema::{CONCEPT_INSTANCE, FRAMEWORK_DEPENDENCY};
    use cgraph_core::ContextTarget;
    use cgraph_storage::SqliteStore;
    use serde_json::json;

    fn submit(
        store: &mut SqliteStore,
        value: serde_json::Value,
    ) -> Result<EntrySaved, SyncError> {
        let submission: EntrySubmission = serde_json::from_value(value).unwrap();
        Synchronizer::default().save_entry(store, &submission)
    }

    #[test]
    fn new_entries_need_a_table_and_a_name() {
        let mut store = SqliteStore::in_memory().unwrap();
        let err = submit(&mut store, json!({"name": "Physics"})).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        let err = submit(&mut store, json!({"table": "framework", "description": "x"})).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(store.list_frameworks().unwrap().is_empty());
    }

    #[test]
    fn framework_dependencies_skip_general_and_unknown_ids() {
        let mut store = SqliteStore::in_memory().unwrap();
        let general = submit(&mut store, json!({"table": "framework", "name": "General"}))
            .unwrap()
            .id;
        let math = submit(&mut store, json!({"table": "framework", "name": "Math"}))
            .unwrap()
            .id;

        let saved = submit(
            &mut store,
            json!({
                "table": "framework",
                "id": "-3",
                "name": "Physics",
                "dependencies": {
                    general.to_string(): false,
                    math.to_string(): false,
                    "77": false,
                    "": false
                }
            }),
        )
        .unwrap();

        assert_eq!(store.find_links(&FRAMEWORK_DEPENDENCY, saved.id).unwrap(), vec![math]);
        assert_eq!(saved.dangling.len(), 1);
        let view = &saved.entries.framework[&FrameworkId(saved.id)];
        assert_eq!(view.old_id, Some(ClientId(-3)));
        assert_eq!(
            view.dependencies.keys().map(|f| f.0).collect::<Vec<_>>(),
            vec![general, math]
        );
    }

    #[test]
    fn eager_dependencies_load_their_subgraph() {
        let mut store = SqliteStore::in_memory().unwrap();
        let math = submit(&mut store, json!({"table": "framework", "name": "Math"}))
            .unwrap()
            .id;
        let concept = submit(
            &mut store,
            json!({"table": "concept", "name": "number", "framework": math}),
        )
        .unwrap()
        .id;
        let relation = Synchronizer::default()
            .save_relation(
                &mut store,
                &serde_json::from_value::<RelationSnapshot>(json!({
                    "id": -1,
                    "framework": math,
                    "nodes": [{"id": -1, "concept": concept}]
                }))
                .unwrap(),
            )
            .unwrap();

        let saved = submit(
            &mut store,
            json!({
                "table": "framework",
                "name": "Physics",
                "dependencies": {math.to_string(): true}
            }),
        )
        .unwrap();
        assert!(saved.entries.framework[&FrameworkId(math)].loaded);
        assert!(saved.entries.concept.contains_key(&ConceptId(concept)));
        assert!(saved.entries.law.contains_key(&relation.law));
        assert_eq!(saved.entries.node.len(), 1);
        assert!(!saved.entries.framework[&FrameworkId(saved.id)].loaded);
    }

    #[test]
    fn concept_updates_are_partial() {
        let mut store = SqliteStore::in_memory().unwrap();
        let created = submit(
            &mut store,
            json!({
                "table": "concept",
                "id": -1,
                "name": "loop",
                "symbol": "o",
                "head": -1
            }),
        )
        .unwrap();
        let id = ConceptId(created.id);
        assert_eq!(store.get_concept(id).unwrap().head, Some(id));

        submit(
            &mut store,
            json!({"table": "concept", "id": created.id, "description": "closed", "symbol": null}),
        )
        .unwrap();
        let concept = store.get_concept(id).unwrap();
        assert_eq!(concept.name, "loop");
        assert_eq!(concept.description.as_deref(), Some("closed"));
        assert_eq!(concept.symbol, None);
        assert_eq!(concept.head, Some(id));
    }

    #[test]
    fn instance_of_links_are_replaced_wholesale() {
        let mut store = SqliteStore::in_memory().unwrap();
        let a = submit(&mut store, json!({"table": "concept", "name": "a"})).unwrap().id;
        let b = submit(&mut store, json!({"table": "concept", "name": "b"})).unwrap().id;
        let c = submit(
            &mut store,
            json!({"table": "concept", "name": "c", "instance_of": {a.to_string(): false}}),
        )
        .unwrap()
        .id;
        assert_eq!(store.find_links(&CONCEPT_INSTANCE, c).unwrap(), vec![a]);

        let saved = submit(
            &mut store,
            json!({"table": "concept", "id": c, "instance_of": {b.to_string(): false}}),
        )
        .unwrap();
        assert_eq!(store.find_links(&CONCEPT_INSTANCE, c).unwrap(), vec![b]);
        let view = &saved.entries.concept[&ConceptId(c)];
        assert_eq!(view.instance_of.keys().map(|k| k.0).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn updating_a_missing_record_is_not_found() {
        let mut store = SqliteStore::in_memory().unwrap();
        let err = submit(&mut store, json!({"table": "law", "id": 8, "name": "x"})).unwrap_err();
        assert!(matches!(
            err,
            SyncError::NotFound {
                kind: EntityKind::Law,
                id: 8
            }
        ));
    }

    #[test]
    fn links_the_kind_does_not_have_are_rejected() {
        let mut store = SqliteStore::in_memory().unwrap();
        let err = submit(
            &mut store,
            json!({"table": "law", "name": "x", "instance_of": {"1": false}}),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn deleting_a_law_removes_its_context_concepts() {
        let mut store = SqliteStore::in_memory().unwrap();
        let per_node = submit(
            &mut store,
            json!({"table": "concept", "name": "this node", "node_specific": true}),
        )
        .unwrap()
        .id;
        let per_law = submit(
            &mut store,
            json!({"table": "concept", "name": "this law", "law_specific": true}),
        )
        .unwrap()
        .id;
        let relation = Synchronizer::default()
            .save_relation(
                &mut store,
                &serde_json::from_value::<RelationSnapshot>(json!({
                    "id": -1,
                    "nodes": [
                        {"id": -1, "concept": per_node},
                        {"id": -2, "concept": per_law}
                    ]
                }))
                .unwrap(),
            )
            .unwrap();
        assert_eq!(
            store.get_context(ConceptId(per_law)).unwrap(),
            Some(ContextTarget::Law(relation.law))
        );

        let err = submit(&mut store, json!({"table": "law", "deleted": true})).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        let saved = submit(
            &mut store,
            json!({"table": "law", "id": relation.law.0, "deleted": true}),
        )
        .unwrap();
        assert!(saved.deleted);
        assert_eq!(
            saved.removed_concepts,
            vec![ConceptId(per_law), ConceptId(per_node)]
        );
        assert!(!store.exists(EntityKind::Law, relation.law.0).unwrap());
        assert!(!store.exists(EntityKind::Concept, per_node).unwrap());
    }

    #[test]
    fn deleting_a_framework_removes_context_concepts_of_its_laws() {
        let mut store = SqliteStore::in_memory().unwrap();
        let physics = submit(&mut store, json!({"table": "framework", "name": "Physics"}))
            .unwrap()
            .id;
        let force = submit(
            &mut store,
            json!({"table": "concept", "name": "force", "framework": physics}),
        )
        .unwrap()
        .id;
        let global = submit(
            &mut store,
            json!({"table": "concept", "name": "this node", "node_specific": true}),
        )
        .unwrap()
        .id;
        let plain = submit(&mut store, json!({"table": "concept", "name": "thing"}))
            .unwrap()
            .id;
        let relation = Synchronizer::default()
            .save_relation(
                &mut store,
                &serde_json::from_value::<RelationSnapshot>(json!({
                    "id": -1,
                    "framework": physics,
                    "nodes": [
                        {"id": -1, "concept": global},
                        {"id": -2, "concept": force},
                        {"id": -3, "concept": plain}
                    ]
                }))
                .unwrap(),
            )
            .unwrap();

        let saved = submit(
            &mut store,
            json!({"table": "framework", "id": physics, "deleted": true}),
        )
        .unwrap();
        assert_eq!(saved.removed_concepts, vec![ConceptId(global)]);
        assert!(!store.exists(EntityKind::Law, relation.law.0).unwrap());
        assert!(!store.exists(EntityKind::Concept, force).unwrap());
        assert!(!store.exists(EntityKind::Concept, global).unwrap());
        assert!(store.exists(EntityKind::Concept, plain).unwrap());
    }

    #[test]
    fn rejected_dangling_links_roll_back_the_insert() {
        let mut store = SqliteStore::in_memory().unwrap();
        let submission: EntrySubmission = serde_json::from_value(json!({
            "table": "framework",
            "name": "Physics",
            "dependencies": {"12": false}
        }))
        .unwrap();
        let sync = Synchronizer::new(SyncOptions {
            dangling: DanglingPolicy::Reject,
        });
        let err = sync.save_entry(&mut store, &submission).unwrap_err();
        assert!(matches!(err, SyncError::DanglingReference(_)));
        assert!(store.list_frameworks().unwrap().is_empty());
    }
}
