use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pepkit::math::pep::functions::SmoothConvexFunction;
use pepkit::math::pep::{Pep, SolveConfig};

fn gradient_descent(steps: usize) -> Pep {
    let mut problem = Pep::new();
    let f = problem.declare_function(SmoothConvexFunction::new(1.0).unwrap(), true);
    let xs = f.stationary_point().unwrap();
    let fs = f.value(&xs);
    let x0 = problem.set_initial_point();

    let mut x = x0.clone();
    for _ in 0..steps {
        x = &x - f.gradient(&x);
    }
    problem.set_initial_condition((&x0 - &xs).norm_squared() - 1.0);
    problem.set_performance_metric(f.value(&x) - fs);
    problem
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_gradient_descent");
    for &steps in &[1usize, 5, 10, 20] {
        let problem = gradient_descent(steps);
        group.bench_with_input(BenchmarkId::from_parameter(steps), &problem, |b, problem| {
            b.iter(|| black_box(problem.compile().unwrap().to_sdp()));
        });
    }
    group.finish();
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve_gradient_descent");
    group.sample_size(10);
    for &steps in &[1usize, 3, 5] {
        let problem = gradient_descent(steps);
        let config = SolveConfig::default();
        group.bench_with_input(BenchmarkId::from_parameter(steps), &problem, |b, problem| {
            b.iter(|| black_box(problem.solve(&config).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_solve);
criterion_main!(benches);
