//! `whoop_data_query`: biometric lookups forwarded to the biometric collaborator.

use serde::Deserialize;
use serde_json::Value;

use super::{ExecutionSide, ParamSpec, ToolSpec};
use crate::error::GatewayResult;
use crate::integrations::biometrics::{unavailable_payload, BiometricKind, BiometricSource};

pub const NAME: &str = "whoop_data_query";

const PARAMS: &[ParamSpec] = &[
    ParamSpec::string("data_type", "Type of biometric data to query")
        .required()
        .one_of(&["recovery", "sleep", "strain", "hrv"]),
    ParamSpec::integer("days_back", "Number of days to look back (default: 7)").default_int(7),
];

pub const SPEC: ToolSpec = ToolSpec {
    name: NAME,
    description: "Query WHOOP biometric data for the user. Can fetch:
- recovery: Latest recovery score and metrics
- sleep: Recent sleep performance and quality
- strain: Workout strain and cardiovascular load
- hrv: Heart rate variability trends

Use this when the user asks about their health metrics, recovery, sleep, or workout data.",
    side: ExecutionSide::Client,
    params: PARAMS,
};

#[derive(Debug, Deserialize)]
pub struct WhoopQueryArgs {
    pub data_type: BiometricKind,
    pub days_back: u32,
}

/// An unreachable collaborator is not an error: the model gets an explicit
/// "unavailable" payload it can explain to the user.
pub async fn run(source: &dyn BiometricSource, args: &Value) -> GatewayResult<Value> {
    let args: WhoopQueryArgs = SPEC.parse_args(args)?;
    match source.query(args.data_type, args.days_back).await {
        Ok(payload) => Ok(payload),
        Err(e) => {
            tracing::warn!(data_type = %args.data_type, error = %e, "biometric query failed");
            Ok(unavailable_payload(
                args.data_type,
                args.days_back,
                Some(&e.to_string()),
            ))
        }
    }
}
