//! Counter application with two components sharing one store

use std::rc::Rc;

use specks::{create_store, store_state, Accessors, Store, Unit};

store_state! {
    #[derive(Clone)]
    struct CounterState => CounterPatch {
        count: i32,
        step: i32,
        history: Rc<Vec<i32>>,
        increment: Rc<dyn Fn()>,
        set_step: Rc<dyn Fn(i32)>,
    }
}

fn counter_store() -> Store<CounterState> {
    create_store(|acc: Accessors<CounterState>| {
        let increment = {
            let acc = acc.clone();
            Rc::new(move || {
                acc.update(|s| {
                    let count = s.count + s.step;
                    let mut history = (*s.history).clone();
                    history.push(count);
                    CounterPatch::new().count(count).history(Rc::new(history))
                })
            })
        };
        let set_step = Rc::new(move |step: i32| acc.set(CounterPatch::new().step(step)));

        CounterState {
            count: 0,
            step: 1,
            history: Rc::new(vec![0]),
            increment,
            set_step,
        }
    })
}

fn display(store: &Store<CounterState>) -> String {
    let count = store.use_store(|s: &CounterState| s.count);
    format!("count is {count}")
}

fn step_picker(store: &Store<CounterState>) -> String {
    let step = store.use_store(|s: &CounterState| s.step);
    format!("step is {step}")
}

fn render_dirty(name: &str, unit: &Unit, body: impl FnOnce() -> String) {
    if unit.is_dirty() {
        println!("   [{name}] {}", unit.evaluate(body));
    } else {
        println!("   [{name}] skipped");
    }
}

fn main() {
    println!("=== Counter Demo ===\n");

    let store = counter_store();

    println!("1. Mounting components");
    let display_unit = Unit::detached();
    let picker_unit = Unit::detached();
    println!("   [display] {}", display_unit.evaluate(|| display(&store)));
    println!("   [picker] {}", picker_unit.evaluate(|| step_picker(&store)));

    println!("\n2. Incrementing");
    (store.get().increment)();
    render_dirty("display", &display_unit, || display(&store));
    render_dirty("picker", &picker_unit, || step_picker(&store));

    println!("\n3. Changing the step to 5");
    (store.get().set_step)(5);
    render_dirty("display", &display_unit, || display(&store));
    render_dirty("picker", &picker_unit, || step_picker(&store));

    println!("\n4. Incrementing twice");
    (store.get().increment)();
    (store.get().increment)();
    render_dirty("display", &display_unit, || display(&store));
    render_dirty("picker", &picker_unit, || step_picker(&store));

    println!("\n5. History: {:?}", store.get().history);

    println!("\n6. Unmounting");
    drop(display_unit);
    drop(picker_unit);
    println!("   listeners left: {}", store.listener_count());

    println!("\n✓ Demo complete!");
}
