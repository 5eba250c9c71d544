//! Helpers shared by the unit tests

use alloy::json_abi::JsonAbi;
use serde_json::json;

use crate::artifacts::Artifact;

/// An artifact whose ABI exposes the given no-argument functions and whose
/// bytecode is unique to its name
pub fn dummy_artifact(name: &str, functions: &[&str]) -> Artifact {
    let abi: Vec<_> = functions
        .iter()
        .map(|f| {
            json!({
                "type": "function",
                "name": f,
                "inputs": [],
                "outputs": [],
                "stateMutability": "nonpayable"
            })
        })
        .collect();
    let abi: JsonAbi = serde_json::from_value(json!(abi)).unwrap();

    Artifact {
        contract_name: name.to_string(),
        source_name: None,
        abi,
        bytecode: format!("0x6080{}", hex::encode(name)),
    }
}
