use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tensorfuse::graph::{Device, Node, Subgraph, Value};
use tensorfuse::ir::Dtype;
use tensorfuse::kernel::Kernel;
use tensorfuse::lowering::Registry;
use tensorfuse::stack::{CallArg, EvalStack};

fn add_kernel_graph(len: i64) -> Subgraph {
    let mut graph = Subgraph::default();
    graph.values.push(Value::tensor(0).with_concrete(vec![len], vec![1], Dtype::Float).with_name("a"));
    graph.values.push(Value::tensor(1).with_concrete(vec![len], vec![1], Dtype::Float).with_name("b"));
    graph.values.push(Value::tensor(2).with_concrete(vec![len], vec![1], Dtype::Float));
    graph.graph_inputs.extend([0, 1]);
    graph.graph_outputs.push(2);
    graph.nodes.push(Node {
        kind: "aten::add".into(),
        schema: "aten::add".into(),
        inputs: vec![0, 1],
        outputs: vec![2],
        constant_value: None,
    });
    graph
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_elementwise_add_1024", |b| {
        b.iter(|| {
            let graph = add_kernel_graph(black_box(1024));
            Kernel::new(graph, Device::Cpu, Registry::new(), vec![], false, None).unwrap()
        })
    });
}

fn bench_run(c: &mut Criterion) {
    let graph = add_kernel_graph(1024);
    let kernel = Kernel::new(graph, Device::Cpu, Registry::new(), vec![], false, None).unwrap();
    let stack = EvalStack::new(vec![
        CallArg::Buffer(vec![1.0; 1024]),
        CallArg::Buffer(vec![1.0; 1024]),
        CallArg::Buffer(vec![0.0; 1024]),
    ]);
    c.bench_function("run_elementwise_add_1024", |b| {
        b.iter(|| kernel.run(black_box(&stack)).unwrap())
    });
}

criterion_group!(benches, bench_compile, bench_run);
criterion_main!(benches);
