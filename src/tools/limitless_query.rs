//! `limitless_query`: placeholder for the wearable-recording integration.
//!
//! Always answers with a stub payload; callers must not treat it as live data.

use serde::Deserialize;
use serde_json::{json, Value};

use super::{ExecutionSide, ParamSpec, ToolSpec};
use crate::error::GatewayResult;

pub const NAME: &str = "limitless_query";

const PARAMS: &[ParamSpec] = &[
    ParamSpec::string("query_type", "Type of query to perform")
        .required()
        .one_of(&["search", "recent", "actions", "summary"]),
    ParamSpec::string("search_term", "Search term for 'search' query type"),
    ParamSpec::integer("limit", "Maximum number of results").default_int(5),
];

pub const SPEC: ToolSpec = ToolSpec {
    name: NAME,
    description: "Query Limitless Pendant data and recordings.
Can search conversations, retrieve recent recordings, get action items, or summarize topics.

Use this when the user asks about past conversations, meetings, or things they discussed.",
    side: ExecutionSide::Client,
    params: PARAMS,
};

#[derive(Debug, Deserialize)]
pub struct LimitlessQueryArgs {
    pub query_type: String,
    pub search_term: Option<String>,
    pub limit: u32,
}

pub async fn run(args: &Value) -> GatewayResult<Value> {
    let args: LimitlessQueryArgs = SPEC.parse_args(args)?;
    Ok(json!({
        "query_type": args.query_type,
        "search_term": args.search_term,
        "limit": args.limit,
        "message": format!("Limitless {} query", args.query_type),
        "note": "Placeholder - Limitless API integration pending",
    }))
}
