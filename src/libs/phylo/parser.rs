use super::error::TreeError;
use super::node::NodeId;
use super::tree::Tree;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::{char, multispace0},
    combinator::{cut, map, opt, value},
    error::{Error, ErrorKind, ParseError},
    multi::{fold_many0, many0, many1, separated_list1},
    number::complete::double,
    sequence::{delimited, preceded},
    IResult, Offset, Parser,
};

// ================================================================================================
// Intermediate Structure
// ================================================================================================

/// Recursive node produced by the parser, flattened into the arena afterwards.
#[derive(Debug, Default)]
struct ParsedNode {
    name: Option<String>,
    length: Option<f64>,
    children: Vec<ParsedNode>,
}

impl ParsedNode {
    /// Push this node and its descendants into `tree`, returning the new node's id.
    fn into_arena(self, tree: &mut Tree) -> NodeId {
        let id = tree.add_node();
        if let Some(node) = tree.get_node_mut(id) {
            node.name = self.name;
            node.length = self.length;
        }
        for child in self.children {
            let child_id = child.into_arena(tree);
            tree.link(id, child_id);
        }
        id
    }

    fn into_tree(self) -> Tree {
        let mut tree = Tree::new();
        let root = self.into_arena(&mut tree);
        tree.set_root(root);
        tree
    }
}

// ================================================================================================
// Parsers
// ================================================================================================

fn ws<'a, F, O, E>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
    E: ParseError<&'a str>,
{
    delimited(multispace0, inner, multispace0)
}

// Unquoted labels stop at Newick structural characters and are trimmed.
// Quoted labels ('...' or "...") keep their inner whitespace.
// Inside single quotes, '' stands for one quote.
fn parse_label(input: &str) -> IResult<&str, String> {
    let unquoted = map(take_while(|c: char| !"():;,[]".contains(c)), |s: &str| {
        s.trim().to_string()
    });
    let single_quoted = delimited(
        char('\''),
        fold_many0(
            alt((is_not("'"), value("'", tag("''")))),
            String::new,
            |mut acc: String, part: &str| {
                acc.push_str(part);
                acc
            },
        ),
        char('\''),
    );
    let double_quoted = delimited(
        char('"'),
        map(take_while(|c| c != '"'), String::from),
        char('"'),
    );

    ws(alt((single_quoted, double_quoted, unquoted))).parse(input)
}

// ":0.123", ":1e-5"; a colon without a number is a hard failure
fn parse_length(input: &str) -> IResult<&str, f64> {
    preceded(ws(char(':')), cut(double)).parse(input)
}

// Bracketed comments are accepted anywhere after a label or length and dropped.
fn skip_comments(input: &str) -> IResult<&str, ()> {
    map(
        many0(ws(delimited(char('['), take_while(|c| c != ']'), char(']')))),
        |_| (),
    )
    .parse(input)
}

// (child1,child2,...)Label:Length
fn parse_subtree(input: &str) -> IResult<&str, ParsedNode> {
    let (input, children) = opt(delimited(
        ws(char('(')),
        separated_list1(ws(char(',')), parse_subtree),
        ws(char(')')),
    ))
    .parse(input)?;

    let (input, label) = opt(parse_label).parse(input)?;
    let (input, _) = skip_comments(input)?;
    let (input, length) = opt(parse_length).parse(input)?;
    let (input, _) = skip_comments(input)?;

    let node = ParsedNode {
        name: label.filter(|l| !l.is_empty()),
        length,
        children: children.unwrap_or_default(),
    };

    Ok((input, node))
}

// ================================================================================================
// Entry Points
// ================================================================================================

/// Parses a single Newick tree terminated by ';'.
pub fn parse_newick(input: &str) -> Result<Tree, TreeError> {
    let mut parser = (ws(parse_subtree), ws(char(';')));

    match parser.parse(input) {
        Ok((_, (root, _))) => Ok(root.into_tree()),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(make_tree_error(input, e)),
        Err(nom::Err::Incomplete(_)) => Err(make_tree_error(
            input,
            Error::from_error_kind(&input[input.len()..], ErrorKind::Eof),
        )),
    }
}

/// Parses every tree of a multi-tree Newick document.
/// Top-level `[...]` blocks between trees are skipped.
pub fn parse_newick_multi(input: &str) -> Result<Vec<Tree>, TreeError> {
    let tree = map((ws(parse_subtree), ws(char(';'))), |(root, _)| Some(root));
    let garbage = map(
        ws(delimited(char('['), take_while(|c| c != ']'), char(']'))),
        |_| None,
    );

    match many1(alt((tree, garbage))).parse(input) {
        Ok((rest, parsed)) => {
            if !rest.trim().is_empty() {
                return Err(make_tree_error(
                    input,
                    Error::from_error_kind(rest, ErrorKind::Char),
                ));
            }
            Ok(parsed.into_iter().flatten().map(ParsedNode::into_tree).collect())
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(make_tree_error(input, e)),
        Err(nom::Err::Incomplete(_)) => Err(make_tree_error(
            input,
            Error::from_error_kind(&input[input.len()..], ErrorKind::Eof),
        )),
    }
}

fn make_tree_error(input: &str, e: Error<&str>) -> TreeError {
    let offset = input.offset(e.input);

    let prefix = &input[..offset];
    let line = prefix.chars().filter(|&c| c == '\n').count() + 1;
    let last_newline = prefix.rfind('\n').map(|p| p + 1).unwrap_or(0);
    let column = offset - last_newline + 1;

    let message = match e.code {
        _ if prefix.trim_end().ends_with(':') => "invalid branch length".to_string(),
        ErrorKind::Float => "invalid branch length".to_string(),
        ErrorKind::Char => "unexpected character, expected one of \"(),:;\"".to_string(),
        ErrorKind::Eof => "unexpected end of input".to_string(),
        kind => format!("{:?}", kind),
    };

    TreeError::ParseError {
        message,
        line,
        column,
        snippet: e.input.chars().take(50).collect(),
    }
}

impl Tree {
    /// Parse a Newick string into a Tree.
    ///
    /// ```
    /// use ptrait::libs::phylo::Tree;
    ///
    /// let tree = Tree::from_newick("(A:0.1,B:0.2)Root;").unwrap();
    /// assert_eq!(tree.len(), 3);
    ///
    /// assert!(Tree::from_newick("(A,B:invalid)C;").is_err());
    /// ```
    pub fn from_newick(input: &str) -> Result<Self, TreeError> {
        parse_newick(input)
    }

    pub fn from_newick_multi(input: &str) -> Result<Vec<Self>, TreeError> {
        parse_newick_multi(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_simple() {
        let tree = Tree::from_newick("(A,B)C;").unwrap();
        assert_eq!(tree.len(), 3);

        let root = tree.get_node(tree.get_root().unwrap()).unwrap();
        assert_eq!(root.name.as_deref(), Some("C"));
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn test_parser_lengths() {
        let tree = Tree::from_newick("(A:0.1, B:0.2e-1)Root:100;").unwrap();

        let root = tree.get_node(tree.get_root().unwrap()).unwrap();
        assert_eq!(root.length, Some(100.0));

        let a = tree.get_node(root.children[0]).unwrap();
        assert_eq!(a.name.as_deref(), Some("A"));
        assert_eq!(a.length, Some(0.1));

        let b = tree.get_node(root.children[1]).unwrap();
        assert_eq!(b.length, Some(0.02));
    }

    #[test]
    fn test_parser_comments_and_quotes() {
        let input = "
        (
            'Homo sapiens' : 0.1 [human],
            \"Pan troglodytes\" : 0.12
        )Hominini[&&NHX:S=x];
        ";
        let tree = Tree::from_newick(input).unwrap();
        let root = tree.get_node(tree.get_root().unwrap()).unwrap();
        assert_eq!(root.name.as_deref(), Some("Hominini"));

        let c0 = tree.get_node(root.children[0]).unwrap();
        assert_eq!(c0.name.as_deref(), Some("Homo sapiens"));
        assert_eq!(c0.length, Some(0.1));

        let c1 = tree.get_node(root.children[1]).unwrap();
        assert_eq!(c1.name.as_deref(), Some("Pan troglodytes"));
    }

    #[test]
    fn test_parser_doubled_quotes() {
        let tree = Tree::from_newick("('O''Brien','''tis',B)'x''';").unwrap();
        let root = tree.get_node(tree.get_root().unwrap()).unwrap();
        assert_eq!(root.name.as_deref(), Some("x'"));
        assert_eq!(tree.get_leaf_names(), vec!["O'Brien", "'tis", "B"]);
    }

    #[test]
    fn test_parser_unnamed_internal() {
        let tree = Tree::from_newick("((A:1,B:1):1,C:2);").unwrap();
        assert_eq!(tree.len(), 5);
        let root = tree.get_node(tree.get_root().unwrap()).unwrap();
        assert!(root.name.is_none());
        let inner = tree.get_node(root.children[0]).unwrap();
        assert!(inner.name.is_none());
        assert_eq!(inner.length, Some(1.0));
    }

    #[test]
    fn test_parser_multi() {
        let trees = Tree::from_newick_multi("[header]\n(A,B);\n(C,D)E;\n").unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[1].to_newick(), "(C,D)E;");
    }

    #[test]
    fn test_parser_error() {
        match Tree::from_newick("(A,B)C") {
            Err(TreeError::ParseError { line, column, .. }) => {
                assert_eq!(line, 1);
                assert_eq!(column, 7);
            }
            res => panic!("Expected ParseError, got {:?}", res),
        }

        match Tree::from_newick("(A,B:invalid)C;") {
            Err(TreeError::ParseError { message, .. }) => {
                assert!(message.contains("branch length"));
            }
            res => panic!("Expected ParseError, got {:?}", res),
        }
    }
}
