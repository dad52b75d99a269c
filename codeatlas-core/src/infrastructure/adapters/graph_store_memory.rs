// codeatlas-core/src/infrastructure/adapters/graph_store_memory.rs
//
// `GraphStore` backed by an in-process `petgraph::graph::DiGraph`,
// suitable for `codeatlas run` without an external graph database. A
// real deployment would point `graphStore.uri` at Neo4j or similar via a
// sibling adapter implementing the same trait.

use async_trait::async_trait;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::AtlasError;
use crate::ports::graph_store::{GraphStore, PoiNode, RelationshipEdge};

#[derive(Debug, Clone)]
struct NodeData {
    id: String,
    file_path: String,
}

#[derive(Debug, Clone)]
struct EdgeData {
    rel_type: String,
    confidence: f64,
}

struct Inner {
    graph: DiGraph<NodeData, EdgeData>,
    index_by_id: HashMap<String, NodeIndex>,
}

pub struct InMemoryGraphStore {
    inner: Mutex<Inner>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                graph: DiGraph::new(),
                index_by_id: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, AtlasError> {
        self.inner
            .lock()
            .map_err(|_| AtlasError::Internal("InMemoryGraphStore mutex poisoned".to_string()))
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_nodes(&self, nodes: &[PoiNode]) -> Result<(), AtlasError> {
        let mut inner = self.lock()?;
        for node in nodes {
            if let Some(&idx) = inner.index_by_id.get(&node.id) {
                if let Some(data) = inner.graph.node_weight_mut(idx) {
                    data.file_path = node.file_path.clone();
                }
            } else {
                let idx = inner.graph.add_node(NodeData {
                    id: node.id.clone(),
                    file_path: node.file_path.clone(),
                });
                inner.index_by_id.insert(node.id.clone(), idx);
            }
        }
        Ok(())
    }

    async fn upsert_edges(&self, edges: &[RelationshipEdge]) -> Result<(), AtlasError> {
        let mut inner = self.lock()?;
        for edge in edges {
            let source = *inner
                .index_by_id
                .get(&edge.source_id)
                .ok_or_else(|| AtlasError::Internal(format!("unknown source node {}", edge.source_id)))?;
            let target = *inner
                .index_by_id
                .get(&edge.target_id)
                .ok_or_else(|| AtlasError::Internal(format!("unknown target node {}", edge.target_id)))?;

            let existing = inner
                .graph
                .edges_connecting(source, target)
                .find(|e| e.weight().rel_type == edge.rel_type)
                .map(|e| e.id());

            if let Some(edge_idx) = existing {
                if let Some(data) = inner.graph.edge_weight_mut(edge_idx) {
                    data.confidence = edge.confidence;
                }
            } else {
                inner.graph.add_edge(
                    source,
                    target,
                    EdgeData {
                        rel_type: edge.rel_type.clone(),
                        confidence: edge.confidence,
                    },
                );
            }
        }
        Ok(())
    }

    async fn delete_nodes_by_file_path(&self, paths: &[String]) -> Result<usize, AtlasError> {
        let mut inner = self.lock()?;
        let to_remove: Vec<NodeIndex> = inner
            .graph
            .node_indices()
            .filter(|&idx| {
                inner
                    .graph
                    .node_weight(idx)
                    .map(|n| paths.iter().any(|p| p == &n.file_path))
                    .unwrap_or(false)
            })
            .collect();

        let removed = to_remove.len();
        for idx in to_remove {
            if let Some(data) = inner.graph.node_weight(idx) {
                inner.index_by_id.remove(&data.id.clone());
            }
            inner.graph.remove_node(idx);
        }
        Ok(removed)
    }

    async fn node_count(&self) -> Result<usize, AtlasError> {
        Ok(self.lock()?.graph.node_count())
    }

    async fn edge_count(&self) -> Result<usize, AtlasError> {
        Ok(self.lock()?.graph.edge_count())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn node(id: &str, path: &str) -> PoiNode {
        PoiNode {
            id: id.to_string(),
            name: id.to_string(),
            poi_type: "function".to_string(),
            file_path: path.to_string(),
            start_line: 1,
            end_line: 2,
        }
    }

    #[tokio::test]
    async fn test_upsert_nodes_and_edges() {
        let store = InMemoryGraphStore::new();
        store.upsert_nodes(&[node("a", "src/a.py"), node("b", "src/b.py")]).await.unwrap();
        store
            .upsert_edges(&[RelationshipEdge {
                source_id: "a".into(),
                target_id: "b".into(),
                rel_type: "CALLS".into(),
                confidence: 0.9,
            }])
            .await
            .unwrap();
        assert_eq!(store.node_count().await.unwrap(), 2);
        assert_eq!(store.edge_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_nodes_by_file_path_removes_incident_edges() {
        let store = InMemoryGraphStore::new();
        store.upsert_nodes(&[node("a", "src/a.py"), node("b", "src/b.py")]).await.unwrap();
        store
            .upsert_edges(&[RelationshipEdge {
                source_id: "a".into(),
                target_id: "b".into(),
                rel_type: "CALLS".into(),
                confidence: 0.9,
            }])
            .await
            .unwrap();

        let removed = store.delete_nodes_by_file_path(&["src/a.py".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.node_count().await.unwrap(), 1);
        assert_eq!(store.edge_count().await.unwrap(), 0);
    }
}
