use colored::Colorize;
use stackflow_config::StackConfig;

pub fn handle(config: &StackConfig) -> anyhow::Result<()> {
    let (stack, outputs) = super::assemble(config)?;
    outputs.check_references(&stack)?;
    let plan = stack.plan()?;

    println!(
        "Stack {} ({})",
        config.resource_group_name.cyan(),
        config.location
    );
    println!();

    for wave in 0..plan.depth() {
        println!("{}", format!("Wave {}", wave + 1).bold());
        for step in plan.wave(wave) {
            let after = if step.dependencies.is_empty() {
                String::new()
            } else {
                let names: Vec<_> = step.dependencies.iter().map(String::as_str).collect();
                format!(" after {}", names.join(", "))
            };
            println!("  {} {} ({}){}", "+".green(), step.name.cyan(), step.kind, after);
        }
    }

    if !stack.excluded().is_empty() {
        println!();
        println!("{}", "Excluded:".dimmed());
        for name in stack.excluded() {
            println!("  {} {}", "-".dimmed(), name.dimmed());
        }
    }

    println!();
    println!("Outputs: {}", outputs.keys().collect::<Vec<_>>().join(", "));
    println!("{}", plan.summary().to_string().bold());
    Ok(())
}
