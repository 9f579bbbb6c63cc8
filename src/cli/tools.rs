use agentic_gateway::tools::{ExecutionSide, ToolRegistry};

/// Print the tool catalog offered to the model.
pub fn list() {
    let registry = ToolRegistry::standard();
    println!("{} tool(s)\n", registry.list().len());

    for spec in registry.list() {
        let side = match spec.side {
            ExecutionSide::Server => "server",
            ExecutionSide::Client => "client",
        };
        let required: Vec<&str> = spec
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        println!("  {:<18} [{side}] {}", spec.name, spec.description);
        if !required.is_empty() {
            println!("  {:<18} requires: {}", "", required.join(", "));
        }
    }
}
