//! Cypher statements used by the graph memory.
//!
//! Everything here runs unchanged on Neo4j and FalkorDB except the index
//! definitions. Timestamps are returned through `toString()` so both
//! backends hand back plain strings.

use crate::traits::GraphProvider;

pub(crate) const CLEAR_GRAPH: &str = "MATCH (n) DETACH DELETE n";

pub(crate) const SAVE_EPISODE: &str = r#"
MERGE (e:Episodic {uuid: $uuid})
SET e.name = $name,
    e.content = $content,
    e.source = $source,
    e.source_description = $source_description,
    e.group_id = $group_id,
    e.created_at = $created_at,
    e.valid_at = $valid_at
RETURN e.uuid AS uuid
"#;

pub(crate) const MERGE_ENTITY: &str = r#"
MERGE (n:Entity {name: $name, group_id: $group_id})
ON CREATE SET n.uuid = $uuid,
              n.created_at = $created_at,
              n.summary = $summary,
              n.labels = $labels,
              n.attributes = $attributes
ON MATCH SET n.summary = CASE WHEN $summary = '' THEN n.summary ELSE $summary END
WITH n
MATCH (e:Episodic {uuid: $episode_uuid})
MERGE (e)-[:MENTIONS]->(n)
RETURN n.uuid AS uuid
"#;

pub(crate) const CREATE_FACT: &str = r#"
MATCH (s:Entity {name: $source, group_id: $group_id})
MATCH (t:Entity {name: $target, group_id: $group_id})
CREATE (s)-[r:RELATES_TO {
    uuid: $uuid,
    name: $name,
    fact: $fact,
    group_id: $group_id,
    created_at: $created_at,
    valid_at: $valid_at,
    episodes: [$episode_uuid]
}]->(t)
RETURN r.uuid AS uuid
"#;

const NODE_FIELDS: &str = r#"
RETURN n.uuid AS uuid,
       n.name AS name,
       coalesce(n.summary, '') AS summary,
       coalesce(n.labels, []) AS labels,
       n.group_id AS group_id,
       toString(n.created_at) AS created_at,
       coalesce(n.attributes, '{}') AS attributes"#;

const EDGE_FIELDS: &str = r#"
RETURN r.uuid AS uuid,
       r.name AS name,
       r.fact AS fact,
       r.group_id AS group_id,
       s.uuid AS source_node_uuid,
       t.uuid AS target_node_uuid,
       toString(r.created_at) AS created_at,
       toString(r.valid_at) AS valid_at,
       toString(r.invalid_at) AS invalid_at,
       coalesce(r.episodes, []) AS episodes"#;

const EPISODE_FIELDS: &str = r#"
RETURN e.uuid AS uuid,
       e.name AS name,
       e.content AS content,
       e.source AS source,
       coalesce(e.source_description, '') AS source_description,
       e.group_id AS group_id,
       toString(e.created_at) AS created_at,
       toString(e.valid_at) AS valid_at"#;

/// Entities within two hops of `$center`, nearest first.
pub(crate) const NEIGHBORHOOD: &str = r#"
MATCH p = (c {uuid: $center})-[*1..2]-(n:Entity)
RETURN n.uuid AS uuid, min(length(p)) AS distance
ORDER BY distance
"#;

pub(crate) fn search_nodes(with_label: bool, centered: bool, limit: usize) -> String {
    let mut filters = vec![
        "n.group_id IN $group_ids",
        "(toLower(n.name) CONTAINS $query OR toLower(coalesce(n.summary, '')) CONTAINS $query)",
    ];
    if with_label {
        filters.push("$label IN coalesce(n.labels, [])");
    }
    if centered {
        filters.push("n.uuid IN $neighbors");
    }
    format!(
        "MATCH (n:Entity)\nWHERE {}{}\nORDER BY created_at DESC\nLIMIT {}",
        filters.join("\n  AND "),
        NODE_FIELDS,
        limit
    )
}

pub(crate) fn search_facts(centered: bool, limit: usize) -> String {
    let mut filters = vec![
        "r.group_id IN $group_ids",
        "(toLower(r.fact) CONTAINS $query OR toLower(r.name) CONTAINS $query)",
    ];
    if centered {
        filters.push("(s.uuid IN $neighbors OR t.uuid IN $neighbors)");
    }
    format!(
        "MATCH (s:Entity)-[r:RELATES_TO]->(t:Entity)\nWHERE {}{}\nORDER BY created_at DESC\nLIMIT {}",
        filters.join("\n  AND "),
        EDGE_FIELDS,
        limit
    )
}

pub(crate) fn get_entity_edge() -> String {
    format!(
        "MATCH (s:Entity)-[r:RELATES_TO {{uuid: $uuid}}]->(t:Entity){}",
        EDGE_FIELDS
    )
}

pub(crate) const DELETE_ENTITY_EDGE: &str = "MATCH ()-[r:RELATES_TO {uuid: $uuid}]->() DELETE r";

pub(crate) fn get_episode() -> String {
    format!("MATCH (e:Episodic {{uuid: $uuid}}){}", EPISODE_FIELDS)
}

pub(crate) const DELETE_EPISODE: &str = "MATCH (e:Episodic {uuid: $uuid}) DETACH DELETE e";

pub(crate) fn recent_episodes(last_n: usize) -> String {
    format!(
        "MATCH (e:Episodic)\nWHERE e.group_id IN $group_ids AND e.valid_at <= $reference_time{}\nORDER BY valid_at DESC\nLIMIT {}",
        EPISODE_FIELDS, last_n
    )
}

/// Index statements for a backend. Safe to run repeatedly.
pub(crate) fn index_statements(provider: GraphProvider) -> Vec<String> {
    const NODE_INDEXES: [(&str, &str, &str); 5] = [
        ("episode_uuid", "Episodic", "uuid"),
        ("episode_group_id", "Episodic", "group_id"),
        ("entity_uuid", "Entity", "uuid"),
        ("entity_group_id", "Entity", "group_id"),
        ("entity_name", "Entity", "name"),
    ];
    const EDGE_INDEXES: [(&str, &str); 2] =
        [("relation_uuid", "uuid"), ("relation_group_id", "group_id")];

    match provider {
        GraphProvider::Neo4j => NODE_INDEXES
            .iter()
            .map(|(name, label, prop)| {
                format!(
                    "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.{})",
                    name, label, prop
                )
            })
            .chain(EDGE_INDEXES.iter().map(|(name, prop)| {
                format!(
                    "CREATE INDEX {} IF NOT EXISTS FOR ()-[e:RELATES_TO]-() ON (e.{})",
                    name, prop
                )
            }))
            .collect(),
        // FalkorDB has no IF NOT EXISTS; the driver treats "already indexed" as success.
        GraphProvider::FalkorDb => NODE_INDEXES
            .iter()
            .map(|(_, label, prop)| format!("CREATE INDEX FOR (n:{}) ON (n.{})", label, prop))
            .chain(EDGE_INDEXES.iter().map(|(_, prop)| {
                format!("CREATE INDEX FOR ()-[e:RELATES_TO]-() ON (e.{})", prop)
            }))
            .collect(),
    }
}
