use quill_markup::{Element, Node};

use crate::error::CompileError;

use super::directive::{AS, BRANCHES, ELIF, ELSE, FOREACH, IF};

fn invalid(reason: &str) -> CompileError {
    CompileError::InvalidDirectiveStructure(reason.to_string())
}

/// Add-time structural checks.
///
/// Branch chains depend only on sibling structure, so they are validated
/// here rather than at first render. Whitespace-only text between chained
/// branch nodes is removed in place.
pub fn validate(root: &mut Element) -> Result<(), CompileError> {
    check_element(root)?;
    if root.has_attr(ELIF) || root.has_attr(ELSE) {
        return Err(unchained());
    }
    validate_children(&mut root.children)
}

fn unchained() -> CompileError {
    invalid("t-elif and t-else directives must be preceded by a t-if or t-elif directive")
}

fn check_element(el: &Element) -> Result<(), CompileError> {
    let branches = BRANCHES.iter().filter(|d| el.has_attr(d)).count();
    if branches > 1 {
        return Err(invalid("only one conditional branching directive is allowed per node"));
    }
    if el.has_attr(FOREACH) {
        if branches > 0 {
            return Err(invalid("t-foreach cannot share a node with t-if, t-elif or t-else"));
        }
        if !el.has_attr(AS) {
            return Err(invalid("t-foreach requires a t-as name"));
        }
    }
    Ok(())
}

fn validate_children(children: &mut Vec<Node>) -> Result<(), CompileError> {
    let mut i = 0;
    while i < children.len() {
        if let Node::Element(el) = &children[i] {
            check_element(el)?;
            if el.has_attr(ELIF) || el.has_attr(ELSE) {
                let prev = children[..i]
                    .iter()
                    .rposition(|n| matches!(n, Node::Element(_)))
                    .ok_or_else(unchained)?;
                let chained = children[prev]
                    .as_element()
                    .is_some_and(|p| p.has_attr(IF) || p.has_attr(ELIF));
                if !chained {
                    return Err(unchained());
                }
                if children[prev + 1..i].iter().any(|n| !n.is_blank_text()) {
                    return Err(invalid("text is not allowed between branching directives"));
                }
                children.drain(prev + 1..i);
                i = prev + 1;
            }
        }
        if let Node::Element(el) = &mut children[i] {
            validate_children(&mut el.children)?;
        }
        i += 1;
    }
    Ok(())
}
