//! Radix tree for matching request paths against route URI templates.
//!
//! Route URIs may contain `{name}` segments. The tree is built from the
//! segments of every URI in the table:
//! - Static segments (e.g., `users`) match exactly
//! - Parameter segments (e.g., `{id}`) match any single segment
//! - Routes are stored at terminal nodes, one per URI
//!
//! Lookup is O(k) in the number of path segments. Static children are tried
//! before parameter children, and parameter children in insertion order, with
//! backtracking when a branch dead-ends.

use std::borrow::Cow;
use std::sync::Arc;

use super::types::{ParamVec, Route};

#[derive(Clone, Default)]
struct RadixNode {
    /// The path segment this node represents (without separators)
    segment: Cow<'static, str>,
    /// Route terminating at this node
    route: Option<Arc<Route>>,
    /// Parameter name if this node is a `{name}` segment
    param_name: Option<Arc<str>>,
    children: Vec<RadixNode>,
    /// Several parameter names may share a position
    /// (e.g., /users/{id}/posts vs /users/{user_id}/comments)
    param_children: Vec<RadixNode>,
}

impl RadixNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: Cow::Owned(segment.to_string()),
            ..Self::default()
        }
    }

    fn new_param(param_name: &str) -> Self {
        Self {
            param_name: Some(Arc::from(param_name)),
            ..Self::default()
        }
    }

    /// Insert `route`, returning the route it replaced at the same template.
    fn insert(&mut self, segments: &[&str], route: Arc<Route>) -> Option<Arc<Route>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.route.replace(route);
        };

        if let Some(param_name) = template_param(segment) {
            if let Some(child) = self
                .param_children
                .iter_mut()
                .find(|c| c.param_name.as_deref() == Some(param_name))
            {
                return child.insert(remaining, route);
            }
            let mut child = RadixNode::new_param(param_name);
            child.insert(remaining, route);
            self.param_children.push(child);
            return None;
        }

        if let Some(child) = self.children.iter_mut().find(|c| c.segment == *segment) {
            return child.insert(remaining, route);
        }
        let mut child = RadixNode::new(segment);
        child.insert(remaining, route);
        self.children.push(child);
        None
    }

    fn search(&self, segments: &[&str], params: &mut ParamVec) -> Option<Arc<Route>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self.route.clone();
        };

        for child in &self.children {
            if child.segment == *segment {
                if let Some(route) = child.search(remaining, params) {
                    return Some(route);
                }
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.push((Arc::clone(name), decode_segment(segment)));
                if let Some(route) = child.search(remaining, params) {
                    return Some(route);
                }
                // Backtrack
                params.pop();
            }
        }

        None
    }
}

fn template_param(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

/// Percent-decode a captured segment; invalid UTF-8 keeps the raw text.
fn decode_segment(segment: &str) -> String {
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

fn split(uri: &str) -> Vec<&str> {
    uri.split('/').filter(|s| !s.is_empty()).collect()
}

/// Template matcher over the routes of one table.
#[derive(Clone, Default)]
pub(crate) struct RadixTree {
    root: RadixNode,
}

impl RadixTree {
    pub(crate) fn insert(&mut self, route: Arc<Route>) -> Option<Arc<Route>> {
        let uri = route.uri().to_string();
        self.root.insert(&split(&uri), route)
    }

    /// Match a normalized path, filling `params` with captured segments.
    pub(crate) fn search(&self, path: &str, params: &mut ParamVec) -> Option<Arc<Route>> {
        self.root.search(&split(path), params)
    }
}
