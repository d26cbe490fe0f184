use atomidx::linker::{self, AtomGraph, MemorySource, ProjectFacts};
use atomidx::model::{Atom, AtomKind, CallRef, CallType};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

const FUNCTIONS_PER_FILE: usize = 20;

fn module_path(idx: usize) -> String {
    format!("src/mod{idx}.js")
}

fn function_name(file: usize, idx: usize) -> String {
    format!("fn{file}_{idx}")
}

/// Each file imports the previous one and calls a few of its exports, so every
/// pass has real work to do.
fn synthetic_project(files: usize) -> (Vec<Atom>, MemorySource) {
    let mut atoms = Vec::with_capacity(files * FUNCTIONS_PER_FILE);
    let mut source = MemorySource::new();
    for file in 0..files {
        let path = module_path(file);
        let prev = file.checked_sub(1);
        let local_prefix = format!("fn{file}_");
        let mut text = String::new();
        if let Some(prev) = prev {
            let names: Vec<_> = (0..FUNCTIONS_PER_FILE)
                .map(|idx| function_name(prev, idx))
                .collect();
            text.push_str(&format!(
                "import {{ {} }} from './mod{prev}.js';\nimport * as ns{prev} from './mod{prev}.js';\n\n",
                names.join(", ")
            ));
        }
        for idx in 0..FUNCTIONS_PER_FILE {
            let name = function_name(file, idx);
            let mut calls = Vec::new();
            if let Some(prev) = prev {
                calls.push(function_name(prev, idx));
                calls.push(format!("ns{prev}.{}", function_name(prev, (idx + 1) % FUNCTIONS_PER_FILE)));
            }
            if idx > 0 {
                calls.push(function_name(file, idx - 1));
            }
            calls.push("console.log".to_string());

            let line = text.lines().count() as i64 + 1;
            text.push_str(&format!("export function {name}() {{\n"));
            for call in &calls {
                text.push_str(&format!("  {call}();\n"));
            }
            text.push_str("}\n\n");

            let mut atom = Atom::new(&path, &name, None, AtomKind::Function);
            atom.is_exported = true;
            atom.line = line;
            atom.calls = calls
                .into_iter()
                .enumerate()
                .map(|(offset, name)| CallRef {
                    call_type: if name.starts_with(&local_prefix) {
                        CallType::Internal
                    } else {
                        CallType::External
                    },
                    name,
                    line: line + offset as i64 + 1,
                })
                .collect();
            atoms.push(atom);
        }
        source.insert(&path, &text);
    }
    (atoms, source)
}

fn bench_link(c: &mut Criterion) {
    let mut group = c.benchmark_group("link");
    for files in [10usize, 50, 200] {
        let (atoms, source) = synthetic_project(files);
        let facts = ProjectFacts::build(&source.paths(), &source);
        group.bench_with_input(BenchmarkId::from_parameter(files), &files, |b, _| {
            b.iter(|| {
                let mut graph = AtomGraph::new(atoms.clone());
                let report = linker::link(&mut graph, &facts);
                black_box(report.edges_added)
            })
        });
    }
    group.finish();
}

fn bench_facts(c: &mut Criterion) {
    let (_, source) = synthetic_project(200);
    let paths = source.paths();
    c.bench_function("project_facts_200_files", |b| {
        b.iter(|| black_box(ProjectFacts::build(&paths, &source)))
    });
}

criterion_group!(benches, bench_link, bench_facts);
criterion_main!(benches);
