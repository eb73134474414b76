//! Evaluator benchmarks using divan
//!
//! Benchmarks plan evaluation only; parsing and planning happen once per bench.

use octofhir_cel::{CelEnv, Interpretable, MapActivation, Value};

fn main() {
    divan::main();
}

// Helper to plan an expression in a default environment
fn plan(env: &CelEnv, source: &str) -> Interpretable {
    let parsed = env.parse(source).expect("benchmark source parses");
    env.plan(&parsed.expr).expect("benchmark source plans")
}

fn numbers(len: i64) -> Value {
    Value::from((0..len).map(Value::Int).collect::<Vec<_>>())
}

// === Scalar Benchmarks ===

mod scalars {
    use super::*;

    #[divan::bench]
    fn integer_arithmetic(bencher: divan::Bencher) {
        let env = CelEnv::new();
        let plan = plan(&env, "(1 + 2) * 3 - 4 / 5");
        let vars = MapActivation::new();
        bencher.bench_local(|| env.eval(divan::black_box(&plan), &vars));
    }

    #[divan::bench]
    fn string_predicates(bencher: divan::Bencher) {
        let env = CelEnv::new();
        let plan = plan(&env, "name.startsWith('ad') && name.matches('^[a-z]+$')");
        let vars = MapActivation::new().with("name", "ada");
        bencher.bench_local(|| env.eval(divan::black_box(&plan), &vars));
    }

    #[divan::bench]
    fn qualified_variable(bencher: divan::Bencher) {
        let env = CelEnv::new();
        let plan = plan(&env, "a.b.c + 1");
        let vars = MapActivation::new().with("a.b.c", 1_i64);
        bencher.bench_local(|| env.eval(divan::black_box(&plan), &vars));
    }
}

// === Comprehension Benchmarks ===

mod comprehensions {
    use super::*;

    #[divan::bench(args = [10, 100, 1000])]
    fn exists(bencher: divan::Bencher, len: i64) {
        let env = CelEnv::new();
        let plan = plan(&env, "xs.exists(x, x < 0)");
        let vars = MapActivation::new().with("xs", numbers(len));
        bencher.bench_local(|| env.eval(divan::black_box(&plan), &vars));
    }

    #[divan::bench(args = [10, 100, 1000])]
    fn map_filter(bencher: divan::Bencher, len: i64) {
        let env = CelEnv::new();
        let plan = plan(&env, "xs.filter(x, x % 2 == 0).map(x, x * x)");
        let vars = MapActivation::new().with("xs", numbers(len));
        bencher.bench_local(|| env.eval(divan::black_box(&plan), &vars));
    }
}
