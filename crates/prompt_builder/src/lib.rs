//! Prompt Builder - context assembly for per-method test generation
//!
//! Builds the textual context handed to the generation backend for one
//! target method, either from the class alone or enriched with dependency
//! snippets resolved through the Source Info Store. The section order is a
//! contract: package -> imports -> class shell -> helpers -> target method.

pub mod formatter;
pub mod types;

pub use types::{Message, PromptInfo, Role};

use anyhow::Result;
use log::{debug, info};
use source_info::{ClassId, ClassInfo, InfoStore, MethodInfo};

/// Fixed tester role for every conversation.
const SYSTEM_PROMPT: &str = "You are a professional Java test engineer. \
You write complete, compilable JUnit test classes for a single target method. \
Always answer with exactly one java code block containing the whole test class.";

/// Context-aware prompt generation backed by the Source Info Store.
pub struct PromptBuilder<'a> {
    store: &'a dyn InfoStore,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(store: &'a dyn InfoStore) -> Self {
        Self { store }
    }

    /// Assemble the prompt state for one method, picking the dependency
    /// mode when the method references at least one dependent method.
    pub fn build_prompt(
        &self,
        class_info: &ClassInfo,
        method_info: &MethodInfo,
    ) -> Result<PromptInfo> {
        if method_info.has_dependencies() {
            self.build_prompt_with_dep(class_info, method_info)
        } else {
            Ok(self.build_prompt_without_dep(class_info, method_info))
        }
    }

    /// No-dependency mode: the class shell with all fields, every other
    /// method's brief, and the full target method source.
    pub fn build_prompt_without_dep(
        &self,
        class_info: &ClassInfo,
        method_info: &MethodInfo,
    ) -> PromptInfo {
        let mut prompt_info = PromptInfo::new(
            false,
            &class_info.class_name,
            &method_info.method_name,
            &method_info.method_signature,
            &method_info.source_code,
        );

        let fields = formatter::join_lines(&class_info.fields);
        let methods =
            formatter::filter_and_join_lines(&class_info.brief_methods, &method_info.brief);
        let imports = formatter::join_lines(&class_info.imports);

        prompt_info.context = format!(
            "{}\n{}\n{} {{\n{}\n{}\n{}\n}}",
            class_info.package_declaration,
            imports,
            class_info.class_signature,
            fields,
            methods,
            method_info.source_code,
        );
        prompt_info
    }

    /// Dependency mode: same-class dependencies surface as briefs, foreign
    /// classes as resolved snippets; constructor dependencies are appended
    /// unless the class already appeared through method dependencies.
    pub fn build_prompt_with_dep(
        &self,
        class_info: &ClassInfo,
        method_info: &MethodInfo,
    ) -> Result<PromptInfo> {
        let mut prompt_info = PromptInfo::new(
            true,
            &class_info.class_name,
            &method_info.method_name,
            &method_info.method_signature,
            &method_info.source_code,
        );

        let mut other_brief_methods: Vec<String> = Vec::new();
        for (dep_class_name, dep_methods) in &method_info.dependent_methods {
            if dep_class_name == &class_info.class_name {
                for signature in dep_methods {
                    let Some(other) = self.store.method_info(class_info, signature)? else {
                        continue;
                    };
                    if !other_brief_methods.contains(&other.brief) {
                        other_brief_methods.push(other.brief);
                    }
                }
                continue;
            }
            if let Some(snippet) = self.resolve_dependency(dep_class_name, dep_methods)? {
                prompt_info
                    .method_deps
                    .insert(dep_class_name.clone(), snippet);
            }
        }

        for (dep_class_name, dep_methods) in &class_info.constructor_deps {
            // Already surfaced through the method dependencies.
            if method_info.dependent_methods.contains_key(dep_class_name) {
                continue;
            }
            if let Some(snippet) = self.resolve_dependency(dep_class_name, dep_methods)? {
                prompt_info
                    .constructor_deps
                    .insert(dep_class_name.clone(), snippet);
            }
        }

        let mut information = format!(
            "{}\n{}\n{} {{\n",
            class_info.package_declaration,
            formatter::join_lines(&class_info.imports),
            class_info.class_signature,
        );
        if method_info.use_field {
            information.push_str(&formatter::join_lines(&class_info.fields));
            information.push('\n');
            information.push_str(&formatter::join_lines(&class_info.getter_setters));
            information.push('\n');
        }
        if class_info.has_constructor {
            information.push_str(&formatter::join_lines(&class_info.constructors));
            information.push('\n');
        }
        information.push_str(&formatter::join_lines(&other_brief_methods));
        information.push('\n');
        information.push_str(&method_info.source_code);
        information.push_str("\n}");

        prompt_info.context = information;
        info!(
            "Built dependency context for < {} > with {} method deps, {} constructor deps",
            method_info.method_name,
            prompt_info.method_deps.len(),
            prompt_info.constructor_deps.len()
        );
        Ok(prompt_info)
    }

    /// Resolve one dependency class into a textual snippet: signature,
    /// fields, constructors, getters/setters, then the briefs of the
    /// depended-on methods. An unknown class yields no snippet; an
    /// unresolvable method is skipped.
    pub fn resolve_dependency<'s>(
        &self,
        dep_class_name: &str,
        dep_methods: impl IntoIterator<Item = &'s String>,
    ) -> Result<Option<String>> {
        let Some(dep_class_info) = self.store.class_info(&ClassId::new(dep_class_name))? else {
            debug!("Dependency class < {} > has no parsed info", dep_class_name);
            return Ok(None);
        };

        let mut snippet = format!(
            "{} {{\n{}\n",
            dep_class_info.class_signature,
            formatter::join_lines(&dep_class_info.fields),
        );
        if dep_class_info.has_constructor {
            snippet.push_str(&formatter::join_lines(&dep_class_info.constructors));
            snippet.push('\n');
        }
        snippet.push_str(&formatter::join_lines(&dep_class_info.getter_setters));
        snippet.push('\n');
        for signature in dep_methods {
            let Some(dep_method_info) = self.store.method_info(&dep_class_info, signature)? else {
                continue;
            };
            snippet.push_str(&dep_method_info.brief);
            snippet.push('\n');
        }
        snippet.push('}');
        Ok(Some(snippet))
    }
}

/// Assemble the chat history for one generation call.
///
/// Round 1 is system + context; a repair round replays the recorded
/// candidate as the assistant turn and appends the diagnostics, so each
/// round's history strictly extends the previous one.
pub fn build_messages(prompt_info: &PromptInfo) -> Vec<Message> {
    let mut messages = vec![Message::system(SYSTEM_PROMPT)];

    let mut content = String::new();
    for (dep_class_name, snippet) in &prompt_info.method_deps {
        content.push_str(&formatter::format_dependency(dep_class_name, snippet));
        content.push_str("\n\n");
    }
    for (dep_class_name, snippet) in &prompt_info.constructor_deps {
        content.push_str(&formatter::format_dependency(dep_class_name, snippet));
        content.push_str("\n\n");
    }
    content.push_str(&format!(
        "The focal method is `{}` in the focal class `{}`, and the information is\n```java\n{}\n```\nPlease write a complete JUnit test class for the focal method.",
        prompt_info.method_signature, prompt_info.class_name, prompt_info.context
    ));
    messages.push(Message::user(content));

    if prompt_info.has_feedback() {
        messages.push(Message::assistant(prompt_info.unit_test.clone()));
        messages.push(Message::user(format!(
            "The test above failed to compile or run. The error message is\n```\n{}\n```\nPlease fix the error and return the complete test class again.",
            prompt_info.error_msg.join("\n")
        )));
    }

    messages
}
