use super::Tree;
use crate::libs::phylo::node::NodeId;
use std::io::Read;

/// Read all Newick trees from a file ("stdin" for standard input).
pub fn from_file(infile: &str) -> anyhow::Result<Vec<Tree>> {
    let mut reader = intspan::reader(infile);
    let mut newick = String::new();
    reader
        .read_to_string(&mut newick)
        .map_err(|e| anyhow::anyhow!("Read error: {}", e))?;
    Ok(Tree::from_newick_multi(newick.as_str())?)
}

/// Serialize tree to a single-line Newick string.
pub fn to_newick(tree: &Tree) -> String {
    match tree.get_root() {
        Some(root) => {
            let mut s = String::new();
            write_subtree(tree, root, &mut s);
            s.push(';');
            s
        }
        None => ";".to_string(),
    }
}

fn write_subtree(tree: &Tree, id: NodeId, s: &mut String) {
    let Some(node) = tree.get_node(id) else {
        return;
    };

    if !node.children.is_empty() {
        s.push('(');
        for (i, &child) in node.children.iter().enumerate() {
            if i > 0 {
                s.push(',');
            }
            write_subtree(tree, child, s);
        }
        s.push(')');
    }

    if let Some(name) = &node.name {
        s.push_str(&quote_label(name));
    }
    if let Some(len) = node.length {
        s.push_str(&format!(":{}", len));
    }
}

// Embedded single quotes are doubled
fn quote_label(label: &str) -> String {
    let needs_quote = label.chars().any(|c| "(),:;[]'\" \t\n".contains(c));
    if needs_quote {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}
