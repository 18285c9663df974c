//! The tool set spec.md §6 names, each wrapping one `RetrievalFacade`
//! call and translating its `Result` into the uniform `ToolResult` shape.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use nook_core::vector::SearchFilter;
use nook_rag::RetrievalFacade;

use crate::protocol::ToolResult;

#[async_trait]
pub trait McpTool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult;
}

/// Name-keyed dispatch table, built once at startup (spec.md §4.1's
/// `ExtractorRegistry` shape applied to tools rather than extensions).
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn McpTool>>,
}

impl ToolRegistry {
    pub fn with_defaults() -> Self {
        let mut tools: HashMap<&'static str, Arc<dyn McpTool>> = HashMap::new();
        macro_rules! register {
            ($t:expr) => {{
                let tool: Arc<dyn McpTool> = Arc::new($t);
                tools.insert(tool.name(), tool);
            }};
        }
        register!(SemanticSearch);
        register!(GetBlockContent);
        register!(ListDocuments);
        register!(GetDocument);
        register!(UpdateDocument);
        register!(EditDocument);
        register!(DeleteDocument);
        register!(RenameDocument);
        register!(SearchDocuments);
        register!(ListTags);
        register!(AddTag);
        register!(RemoveTag);
        register!(PinTag);
        register!(UnpinTag);
        register!(RenameTag);
        register!(DeleteTag);
        register!(AddBookmark);
        register!(AddFileReference);
        register!(AddFolderReference);
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tools.keys().copied().collect();
        names.sort();
        names
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> std::result::Result<&'a str, ToolResult> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolResult::error(format!("missing or non-string \"{key}\" parameter")))
}

fn opt_str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn usize_arg(args: &Value, key: &str, default: usize) -> usize {
    args.get(key).and_then(Value::as_u64).map(|v| v as usize).unwrap_or(default)
}

macro_rules! unwrap_or_return {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(tool_result) => return tool_result,
        }
    };
}

/// `semantic_search{query,limit,granularity∈{documents,chunks},doc_id?,block_id?}`
struct SemanticSearch;

#[async_trait]
impl McpTool for SemanticSearch {
    fn name(&self) -> &'static str {
        "semantic_search"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let query = unwrap_or_return!(str_arg(args, "query"));
        let limit = usize_arg(args, "limit", 10);
        let granularity = opt_str_arg(args, "granularity").unwrap_or("documents");

        let result = if granularity == "chunks" {
            let doc_id = opt_str_arg(args, "doc_id");
            let block_id = opt_str_arg(args, "block_id");
            let filter = match (doc_id, block_id) {
                (Some(d), Some(b)) => Some(SearchFilter::IdPrefix(format!("{d}_{b}_"))),
                (Some(d), None) => Some(SearchFilter::DocId(d.to_string())),
                _ => None,
            };
            facade
                .search_semantic_chunks(query, limit, filter)
                .await
                .map(|hits| ToolResult::ok_json(&hits))
        } else {
            facade
                .search_semantic_documents(query, limit)
                .await
                .map(|hits| ToolResult::ok_json(&hits))
        };
        result.unwrap_or_else(|e| ToolResult::error(e.to_string()))
    }
}

/// `get_block_content{doc_id,block_id}`
struct GetBlockContent;

#[async_trait]
impl McpTool for GetBlockContent {
    fn name(&self) -> &'static str {
        "get_block_content"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        let block_id = unwrap_or_return!(str_arg(args, "block_id"));
        match facade.get_block_content(doc_id, block_id) {
            Ok(text) => ToolResult::ok(text),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `list_documents{}`
struct ListDocuments;

#[async_trait]
impl McpTool for ListDocuments {
    fn name(&self) -> &'static str {
        "list_documents"
    }

    async fn call(&self, facade: &RetrievalFacade, _args: &Value) -> ToolResult {
        ToolResult::ok_json(&facade.list_documents())
    }
}

/// `get_document{doc_id}`
struct GetDocument;

#[async_trait]
impl McpTool for GetDocument {
    fn name(&self) -> &'static str {
        "get_document"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        match facade.get_document(doc_id).and_then(|doc| {
            facade.get_document_content(doc_id).map(|content| (doc, content))
        }) {
            Ok((doc, content)) => ToolResult::ok_json(&serde_json::json!({
                "document": doc,
                "content": content,
            })),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `update_document{doc_id, content}` — `content` is the full block-tree
/// JSON, replacing the document's current content wholesale.
struct UpdateDocument;

#[async_trait]
impl McpTool for UpdateDocument {
    fn name(&self) -> &'static str {
        "update_document"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        let Some(raw_content) = args.get("content") else {
            return ToolResult::error("missing \"content\" parameter".to_string());
        };
        let content = match serde_json::from_value(raw_content.clone()) {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("invalid document content: {e}")),
        };
        match facade.update_document_content(doc_id, &content).await {
            Ok(report) => ToolResult::ok_json(&report),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `edit_document{doc_id, block_id, old_str, new_str}` — str_replace.
struct EditDocument;

#[async_trait]
impl McpTool for EditDocument {
    fn name(&self) -> &'static str {
        "edit_document"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        let block_id = unwrap_or_return!(str_arg(args, "block_id"));
        let old_str = unwrap_or_return!(str_arg(args, "old_str"));
        let new_str = unwrap_or_return!(str_arg(args, "new_str"));
        match facade.edit_document_str_replace(doc_id, block_id, old_str, new_str).await {
            Ok(report) => ToolResult::ok_json(&report),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `delete_document{doc_id}`
struct DeleteDocument;

#[async_trait]
impl McpTool for DeleteDocument {
    fn name(&self) -> &'static str {
        "delete_document"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        match facade.delete_document(doc_id).await {
            Ok(()) => ToolResult::ok(format!("deleted {doc_id}")),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `rename_document{doc_id, title}`
struct RenameDocument;

#[async_trait]
impl McpTool for RenameDocument {
    fn name(&self) -> &'static str {
        "rename_document"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        let title = unwrap_or_return!(str_arg(args, "title"));
        match facade.rename_document(doc_id, title) {
            Ok(doc) => ToolResult::ok_json(&doc),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `search_documents{query}` — lexical search over titles/tags/content.
struct SearchDocuments;

#[async_trait]
impl McpTool for SearchDocuments {
    fn name(&self) -> &'static str {
        "search_documents"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let query = unwrap_or_return!(str_arg(args, "query"));
        ToolResult::ok_json(&facade.search_lexical(query))
    }
}

/// `list_tags{}`
struct ListTags;

#[async_trait]
impl McpTool for ListTags {
    fn name(&self) -> &'static str {
        "list_tags"
    }

    async fn call(&self, facade: &RetrievalFacade, _args: &Value) -> ToolResult {
        ToolResult::ok_json(&facade.list_tags())
    }
}

/// `add_tag{doc_id, tag}`
struct AddTag;

#[async_trait]
impl McpTool for AddTag {
    fn name(&self) -> &'static str {
        "add_tag"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        let tag = unwrap_or_return!(str_arg(args, "tag"));
        match facade.add_tag(doc_id, tag) {
            Ok(doc) => ToolResult::ok_json(&doc),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `remove_tag{doc_id, tag}`
struct RemoveTag;

#[async_trait]
impl McpTool for RemoveTag {
    fn name(&self) -> &'static str {
        "remove_tag"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        let tag = unwrap_or_return!(str_arg(args, "tag"));
        match facade.remove_tag(doc_id, tag) {
            Ok(doc) => ToolResult::ok_json(&doc),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `pin_tag{tag, order?}`
struct PinTag;

#[async_trait]
impl McpTool for PinTag {
    fn name(&self) -> &'static str {
        "pin_tag"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let tag = unwrap_or_return!(str_arg(args, "tag"));
        let order = args.get("order").and_then(Value::as_i64).unwrap_or(0);
        match facade.pin_tag(tag, order) {
            Ok(tag) => ToolResult::ok_json(&tag),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `unpin_tag{tag}`
struct UnpinTag;

#[async_trait]
impl McpTool for UnpinTag {
    fn name(&self) -> &'static str {
        "unpin_tag"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let tag = unwrap_or_return!(str_arg(args, "tag"));
        match facade.unpin_tag(tag) {
            Ok(tag) => ToolResult::ok_json(&tag),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `rename_tag{old_name, new_name}`
struct RenameTag;

#[async_trait]
impl McpTool for RenameTag {
    fn name(&self) -> &'static str {
        "rename_tag"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let old_name = unwrap_or_return!(str_arg(args, "old_name"));
        let new_name = unwrap_or_return!(str_arg(args, "new_name"));
        match facade.rename_tag(old_name, new_name) {
            Ok(tag) => ToolResult::ok_json(&tag),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `delete_tag{tag}`
struct DeleteTag;

#[async_trait]
impl McpTool for DeleteTag {
    fn name(&self) -> &'static str {
        "delete_tag"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let tag = unwrap_or_return!(str_arg(args, "tag"));
        match facade.delete_tag(tag) {
            Ok(()) => ToolResult::ok(format!("deleted tag {tag}")),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `add_bookmark{doc_id, target, after_block_id?}`
struct AddBookmark;

#[async_trait]
impl McpTool for AddBookmark {
    fn name(&self) -> &'static str {
        "add_bookmark"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        let target = unwrap_or_return!(str_arg(args, "target"));
        let after = opt_str_arg(args, "after_block_id");
        match facade.add_bookmark_block(doc_id, target, after).await {
            Ok(report) => ToolResult::ok_json(&report),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `add_file_reference{doc_id, target, after_block_id?}`
struct AddFileReference;

#[async_trait]
impl McpTool for AddFileReference {
    fn name(&self) -> &'static str {
        "add_file_reference"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        let target = unwrap_or_return!(str_arg(args, "target"));
        let after = opt_str_arg(args, "after_block_id");
        match facade.add_file_reference_block(doc_id, target, after).await {
            Ok(report) => ToolResult::ok_json(&report),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

/// `add_folder_reference{doc_id, target, after_block_id?}`
struct AddFolderReference;

#[async_trait]
impl McpTool for AddFolderReference {
    fn name(&self) -> &'static str {
        "add_folder_reference"
    }

    async fn call(&self, facade: &RetrievalFacade, args: &Value) -> ToolResult {
        let doc_id = unwrap_or_return!(str_arg(args, "doc_id"));
        let target = unwrap_or_return!(str_arg(args, "target"));
        let after = opt_str_arg(args, "after_block_id");
        match facade.add_folder_reference_block(doc_id, target, after).await {
            Ok(report) => ToolResult::ok_json(&report),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_includes_the_documented_tool_set() {
        let registry = ToolRegistry::with_defaults();
        for expected in [
            "semantic_search",
            "get_block_content",
            "list_documents",
            "get_document",
            "update_document",
            "edit_document",
            "delete_document",
            "rename_document",
            "search_documents",
            "list_tags",
            "add_tag",
            "remove_tag",
            "pin_tag",
            "unpin_tag",
            "rename_tag",
            "delete_tag",
            "add_bookmark",
            "add_file_reference",
            "add_folder_reference",
        ] {
            assert!(registry.get(expected).is_some(), "missing tool {expected}");
        }
    }

    #[test]
    fn unknown_tool_is_absent() {
        let registry = ToolRegistry::with_defaults();
        assert!(registry.get("does_not_exist").is_none());
    }
}
