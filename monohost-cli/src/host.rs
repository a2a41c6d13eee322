use std::path::Path;

use anyhow::Context;
use monohost::Runtime;
use serde::Serialize;

use crate::{
    app::Cli,
    output::{invocation_table, print_indented, print_output},
};

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub runtime_library: String,
    pub root_domain: String,
    pub script_domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debugger: Option<String>,
    pub assembly: AssemblyReport,
    pub class: String,
    pub invocations: Vec<InvocationReport>,
}

#[derive(Debug, Serialize)]
pub struct AssemblyReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clr_header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<SymbolsReport>,
}

#[derive(Debug, Serialize)]
pub struct SymbolsReport {
    pub path: String,
    pub format: String,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct InvocationReport {
    pub method: String,
    pub strategy: String,
    pub argument: f32,
    /// Value of `GetMyVar()` after the call, when the type exposes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<f32>,
}

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.runtime.host_config();
    let debugger = config.debugger.as_ref().map(ToString::to_string);

    let runtime = Runtime::new(config).context("failed to start the managed runtime")?;
    let domain = runtime.script_domain();

    let assembly = domain
        .load_assembly(&cli.path)
        .with_context(|| format!("failed to load assembly: {}", cli.path.display()))?;
    let class = assembly
        .class(&cli.namespace, &cli.class)
        .with_context(|| format!("failed to resolve {}.{}", cli.namespace, cli.class))?;
    let instance = domain
        .instantiate(&class)
        .with_context(|| format!("failed to instantiate {}", class.full_name()))?;

    let observer = class.method("GetMyVar", 0).ok();

    let mut invocations = Vec::new();
    for &(name, strategy) in cli.strategy.calls() {
        let method = class.method(name, 1)?;
        method
            .invoke(&instance, cli.value, strategy)
            .with_context(|| format!("{} via {} failed", method.full_name(), strategy))?;

        let observed = match &observer {
            Some(getter) => getter
                .invoke_unit(Some(&instance))?
                .map(|boxed| boxed.unbox::<f32>())
                .transpose()?,
            None => None,
        };

        invocations.push(InvocationReport {
            method: method.full_name(),
            strategy: strategy.to_string(),
            argument: cli.value,
            observed,
        });
    }

    let report = RunReport {
        runtime_library: runtime.api().path().display().to_string(),
        root_domain: runtime.root_domain().name().to_string(),
        script_domain: domain.name().to_string(),
        debugger,
        assembly: AssemblyReport {
            path: display_path(assembly.path()),
            clr_header: assembly
                .image_info()
                .map(|info| format!("0x{:08x} ({} bytes)", info.clr_rva, info.clr_size)),
            symbols: assembly.symbols().map(|symbols| SymbolsReport {
                path: display_path(symbols.path()),
                format: symbols.format().to_string(),
                size: symbols.data().len(),
            }),
        },
        class: class.full_name(),
        invocations,
    };

    print_output(&report, &cli.global, print_report)
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

fn print_report(report: &RunReport) {
    println!("Runtime:       {}", report.runtime_library);
    println!(
        "Domains:       {} -> {}",
        report.root_domain, report.script_domain
    );
    match &report.debugger {
        Some(agent) => println!("Debugger:      {agent}"),
        None => println!("Debugger:      disabled"),
    }
    println!("Assembly:      {}", report.assembly.path);
    if let Some(header) = &report.assembly.clr_header {
        println!("CLR header:    {header}");
    }
    match &report.assembly.symbols {
        Some(symbols) => println!(
            "Symbols:       {} ({}, {} bytes)",
            symbols.path, symbols.format, symbols.size
        ),
        None => println!("Symbols:       none"),
    }
    println!("Class:         {}", report.class);
    println!();

    print_indented(&invocation_table(&report.invocations), "  ");
}
