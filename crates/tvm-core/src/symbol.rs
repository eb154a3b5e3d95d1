//! Op names understood by the core compiler.

pub const INJECT: &str = "inject";
pub const DB: &str = "db";

pub const MAP: &str = "map";
pub const INCR: &str = "incr";
pub const CONSTANT: &str = "constant";
pub const LOOPS: &str = "loops";
pub const PATH: &str = "path";

pub const FILTER: &str = "filter";
pub const IS: &str = "is";

pub const UNFOLD: &str = "unfold";

pub const COUNT: &str = "count";
pub const SUM: &str = "sum";
pub const GROUP_COUNT: &str = "group_count";

pub const DEDUP: &str = "dedup";
pub const ORDER: &str = "order";

pub const UNION: &str = "union";
pub const CHOOSE: &str = "choose";
pub const REPEAT: &str = "repeat";

/// Argument of `map` that projects the traverser's own object.
pub const TRAVERSER_OBJECT: &str = "traverser::object";
/// Separates path labels from by-modulators in `path` args.
pub const BY_SEPARATOR: &str = "|";

/// Flags introducing the bytecode args of a `repeat` instruction.
pub const REPEAT_BODY: &str = "repeat";
pub const REPEAT_UNTIL: &str = "until";
pub const REPEAT_EMIT: &str = "emit";
