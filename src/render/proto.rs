use crate::schema::{Conventions, Field, FieldSet, camelize};
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// One message in the generated file: nested messages, then its own fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageNode<'a> {
    pub name: String,
    /// Keyed by the scope segment the message was derived from.
    pub messages: BTreeMap<String, MessageNode<'a>>,
    /// Sorted by tag, then key.
    pub fields: Vec<&'a Field>,
}

impl<'a> MessageNode<'a> {
    fn new(name: String) -> Self {
        Self {
            name,
            messages: BTreeMap::new(),
            fields: Vec::new(),
        }
    }

    fn sort(&mut self) {
        self.fields
            .sort_by(|a, b| a.tag.cmp(&b.tag).then_with(|| a.key.cmp(&b.key)));
        for child in self.messages.values_mut() {
            child.sort();
        }
    }
}

/// Group merged fields into the message tree implied by their scopes.
pub fn build_message_tree<'a>(fields: &'a FieldSet<Field>, root_name: &str) -> MessageNode<'a> {
    let mut root = MessageNode::new(root_name.to_string());

    for field in fields.values() {
        let mut node = &mut root;
        if !field.scope.is_empty() {
            for segment in field.scope.split('.') {
                node = node
                    .messages
                    .entry(segment.to_string())
                    .or_insert_with(|| MessageNode::new(camelize(segment)));
            }
        }
        node.fields.push(field);
    }

    root.sort();
    root
}

/// Render the full `.proto` file for a merged field set.
///
/// Identical input always produces byte-identical output.
pub fn render_proto(fields: &FieldSet<Field>, conventions: &Conventions) -> anyhow::Result<String> {
    let tree = build_message_tree(fields, &conventions.root_message);

    let mut out = String::new();
    out.push_str("syntax = \"proto3\";\n\n");
    writeln!(out, "package {};\n", conventions.package)?;
    write_message(&mut out, &tree, 0)?;
    Ok(out)
}

fn write_message(out: &mut String, message: &MessageNode<'_>, indent: usize) -> fmt::Result {
    let spaces = " ".repeat(indent * 2);

    writeln!(out, "{}message {} {{", spaces, message.name)?;

    for nested in message.messages.values() {
        write_message(out, nested, indent + 1)?;
    }

    for field in &message.fields {
        let deprecated = if field.deprecated {
            " [deprecated=true]"
        } else {
            ""
        };
        writeln!(
            out,
            "{}  {} {} = {}{};",
            spaces, field.kind, field.name, field.tag, deprecated
        )?;
    }

    write!(out, "{}}}\n\n", spaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, split_key};
    use pretty_assertions::assert_eq;

    fn field(key: &str, kind: FieldType, tag: u32, deprecated: bool) -> (String, Field) {
        let (scope, name) = split_key(key);
        (
            key.to_string(),
            Field {
                key: key.into(),
                name: name.into(),
                scope: scope.into(),
                kind,
                tag,
                deprecated,
            },
        )
    }

    #[test]
    fn renders_nested_messages_before_fields() {
        let fields: FieldSet<Field> = [
            field("a", FieldType::message("A"), 1, false),
            field("a.b", FieldType::scalar("string"), 1, false),
            field("timestamp", FieldType::scalar("string"), 2, false),
        ]
        .into_iter()
        .collect();

        let text = render_proto(&fields, &Conventions::default()).unwrap();
        assert_eq!(
            text,
            "syntax = \"proto3\";\n\
             \n\
             package elastic;\n\
             \n\
             message CommonSchema {\n  \
               message A {\n    \
                 string b = 1;\n  \
               }\n\
             \n  \
               A a = 1;\n  \
               string timestamp = 2;\n\
             }\n\
             \n"
        );
    }

    #[test]
    fn deprecated_fields_are_marked_and_ordered_by_tag() {
        let fields: FieldSet<Field> = [
            field("user_agent", FieldType::message("UserAgent"), 1, false),
            field("user_agent.version", FieldType::scalar("string"), 2, false),
            field("user_agent.deprecated_version_1", FieldType::scalar("int32"), 1, true),
            field("user_agent.tags", FieldType::scalar("string").into_repeated(), 3, false),
        ]
        .into_iter()
        .collect();

        let text = render_proto(&fields, &Conventions::default()).unwrap();
        let body: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("    "))
            .map(str::trim)
            .collect();
        assert_eq!(
            body,
            vec![
                "int32 deprecated_version_1 = 1 [deprecated=true];",
                "string version = 2;",
                "repeated string tags = 3;",
            ]
        );
        assert!(text.contains("  message UserAgent {\n"));
    }

    #[test]
    fn message_tree_mirrors_scopes() {
        let fields: FieldSet<Field> = [
            field("host", FieldType::message("Host"), 1, false),
            field("host.os", FieldType::message("Os"), 1, false),
            field("host.os.name", FieldType::scalar("string"), 1, false),
            field("agent", FieldType::message("Agent"), 2, false),
            field("agent.id", FieldType::scalar("string"), 1, false),
        ]
        .into_iter()
        .collect();

        let tree = build_message_tree(&fields, "Root");
        assert_eq!(tree.name, "Root");
        assert_eq!(tree.messages.keys().collect::<Vec<_>>(), vec!["agent", "host"]);
        assert_eq!(tree.fields.iter().map(|f| f.tag).collect::<Vec<_>>(), vec![1, 2]);

        let os = &tree.messages["host"].messages["os"];
        assert_eq!(os.name, "Os");
        assert_eq!(os.fields[0].key, "host.os.name");
    }

    #[test]
    fn output_is_reproducible_and_configurable() {
        let fields: FieldSet<Field> = [
            field("labels", FieldType::map(), 1, false),
            field("message", FieldType::scalar("string"), 2, true),
        ]
        .into_iter()
        .collect();
        let conv = Conventions {
            package: "ecs.v1".into(),
            root_message: "Event".into(),
            ..Conventions::default()
        };

        let first = render_proto(&fields, &conv).unwrap();
        let second = render_proto(&fields.clone(), &conv).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("package ecs.v1;\n"));
        assert!(first.contains("message Event {\n"));
        assert!(first.contains("  map <string, string> labels = 1;\n"));
        assert!(first.contains("  string message = 2 [deprecated=true];\n"));
    }
}
