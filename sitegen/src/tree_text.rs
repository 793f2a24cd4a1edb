use shared::TreeNode;

/// Indented outline of the forest, one label per line.
pub fn tree_lines(forest: &[TreeNode]) -> Vec<String> {
    let mut lines = Vec::new();
    walk(forest, "", &mut lines);
    lines
}

fn walk(nodes: &[TreeNode], prefix: &str, lines: &mut Vec<String>) {
    let last = nodes.len().saturating_sub(1);
    for (index, node) in nodes.iter().enumerate() {
        let is_last = index == last;
        let branch = if is_last { "└ " } else { "├ " };
        lines.push(format!("{prefix}{branch}{}", node.label));
        if node.has_children() {
            let rail = if is_last { "  " } else { "│ " };
            walk(&node.children, &format!("{prefix}{rail}"), lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_rails_for_open_siblings() {
        let mut a = TreeNode::new("A", "a");
        a.children.push(TreeNode::new("A1", "a/1"));
        a.children.push(TreeNode::new("A2", "a/2"));
        let mut b = TreeNode::new("B", "b");
        b.children.push(TreeNode::new("B1", "b/1"));

        assert_eq!(
            tree_lines(&[a, b]),
            vec!["├ A", "│ ├ A1", "│ └ A2", "└ B", "  └ B1"]
        );
        assert!(tree_lines(&[]).is_empty());
    }
}
