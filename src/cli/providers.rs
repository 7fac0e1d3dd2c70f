// src/cli/providers.rs — `kindred providers`

use crate::infra::config::{Config, RoutingConfig};
use crate::provider::resolver::ProviderRegistry;
use crate::provider::GenerationMode;

pub fn show_providers(config: &Config, registry: &ProviderRegistry) {
    println!("kindred v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let catalogue = config.catalogue();
    let available = registry.describe();
    if available.is_empty() {
        println!("  No providers available. Set an API key or save one under credentials/.");
    }
    for (id, name, kind) in &available {
        let model = catalogue.get(id).map(|c| c.model.as_str()).unwrap_or("-");
        println!("  {id:<14} {name:<18} {:<6} {model}", kind.to_string());
    }
    for missing in registry.unavailable() {
        println!("  {:<14} unavailable: {}", missing.id, missing.reason);
    }

    println!();
    print_routing(&config.routing);
}

fn print_routing(routing: &RoutingConfig) {
    println!("Routing:");
    for mode in [
        GenerationMode::ChatReply,
        GenerationMode::Suggestion,
        GenerationMode::Scenario,
        GenerationMode::Teaser,
        GenerationMode::Image,
    ] {
        println!("  {:<11} {}", mode.as_str(), routing.backups_for(mode).join(" → "));
    }
    if let Some(preferred) = &routing.default_preferred {
        println!("  preferred   {preferred}");
    }
}
