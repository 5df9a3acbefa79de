use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use angular_runtime::{
    build_matched_set, Application, DirectiveDefinition, DirectiveRegistry, ForwardRef,
    HookFlags, HostDirectiveEntry, MatchSource, RuntimeError,
};

type Log = Rc<RefCell<Vec<String>>>;

struct Recorder {
    name: &'static str,
    log: Log,
}

impl angular_runtime::Directive for Recorder {
    fn on_init(&mut self) {
        self.log.borrow_mut().push(format!("{}.on_init", self.name));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn recorder(name: &'static str, log: &Log) -> DirectiveDefinition {
    let log = log.clone();
    DirectiveDefinition::directive(name)
        .hooks(HookFlags::ON_INIT)
        .factory(move |_| {
            Ok(Box::new(Recorder {
                name,
                log: log.clone(),
            }))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_initializes_innermost_first() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = DirectiveRegistry::new();

        let d = registry.register(recorder("D", &log)).unwrap();
        let c = registry.register(recorder("C", &log).compose(d)).unwrap();
        let b = registry.register(recorder("B", &log).compose(c)).unwrap();
        registry
            .register(recorder("A", &log).selector("[dir-a]").compose(b))
            .unwrap();

        let mut app = Application::new(registry);
        let el = app.create_root("div", &[("dir-a", "")]).unwrap();
        app.detect_changes();

        assert_eq!(
            *log.borrow(),
            vec!["D.on_init", "C.on_init", "B.on_init", "A.on_init"]
        );
        assert_eq!(
            app.directive_names_on(el).unwrap(),
            vec!["D", "C", "B", "A"]
        );
    }

    #[test]
    fn independent_host_directives_keep_declaration_order() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = DirectiveRegistry::new();

        let first = registry.register(recorder("First", &log)).unwrap();
        let second = registry.register(recorder("Second", &log)).unwrap();
        registry
            .register(
                recorder("Host", &log)
                    .selector("[host]")
                    .compose(first)
                    .compose(second),
            )
            .unwrap();

        let mut app = Application::new(registry);
        app.create_root("div", &[("host", "")]).unwrap();
        app.detect_changes();

        assert_eq!(
            *log.borrow(),
            vec!["First.on_init", "Second.on_init", "Host.on_init"]
        );
    }

    #[test]
    fn duplicate_reachable_via_two_paths_appears_once() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = DirectiveRegistry::new();

        let shared = registry.register(recorder("Shared", &log)).unwrap();
        let left = registry.register(recorder("Left", &log).compose(shared)).unwrap();
        let right = registry.register(recorder("Right", &log).compose(shared)).unwrap();
        registry
            .register(
                recorder("Root", &log)
                    .selector("[root]")
                    .compose(left)
                    .compose(right),
            )
            .unwrap();

        let mut app = Application::new(registry);
        let el = app.create_root("div", &[("root", "")]).unwrap();
        app.detect_changes();

        assert_eq!(
            app.directive_names_on(el).unwrap(),
            vec!["Shared", "Left", "Right", "Root"]
        );
        assert_eq!(
            *log.borrow(),
            vec![
                "Shared.on_init",
                "Left.on_init",
                "Right.on_init",
                "Root.on_init"
            ]
        );
    }

    #[test]
    fn self_composition_cycle_is_rejected_with_member_names() {
        let mut registry = DirectiveRegistry::new();

        // A -> B -> A, with the back edge as a forward reference.
        registry
            .register(
                DirectiveDefinition::directive("A")
                    .selector("[cyclic]")
                    .compose(ForwardRef::by_name("B")),
            )
            .unwrap();
        let a = registry.find("A").unwrap();
        registry
            .register(DirectiveDefinition::directive("B").compose(a))
            .unwrap();

        let mut app = Application::new(registry);
        let error = app.create_root("div", &[("cyclic", "")]).unwrap_err();
        match error {
            RuntimeError::CircularComposition { cycle } => {
                assert_eq!(cycle, vec!["A", "B", "A"]);
            }
            other => panic!("expected CircularComposition, got {other:?}"),
        }
    }

    #[test]
    fn forward_reference_resolves_lazily_and_memoizes() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let resolutions = Rc::new(Cell::new(0usize));

        let mut registry = DirectiveRegistry::new();
        let counter = resolutions.clone();
        let late_ref = ForwardRef::new("Late", move |reg| {
            counter.set(counter.get() + 1);
            reg.find("Late")
        });
        registry
            .register(recorder("Host", &log).selector("[host]").compose(late_ref))
            .unwrap();
        // The target is registered after the reference was declared.
        registry.register(recorder("Late", &log)).unwrap();

        let mut app = Application::new(registry);
        app.create_root("div", &[("host", "")]).unwrap();
        app.create_root("div", &[("host", "")]).unwrap();
        app.detect_changes();

        assert_eq!(resolutions.get(), 1);
        assert_eq!(
            *log.borrow(),
            vec![
                "Late.on_init",
                "Host.on_init",
                "Late.on_init",
                "Host.on_init"
            ]
        );
    }

    #[test]
    fn unresolved_forward_reference_fails_without_corrupting_siblings() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = DirectiveRegistry::new();

        registry
            .register(
                recorder("Broken", &log)
                    .selector("[broken]")
                    .compose(ForwardRef::by_name("Missing")),
            )
            .unwrap();
        registry
            .register(recorder("Fine", &log).selector("[fine]"))
            .unwrap();

        let mut app = Application::new(registry);
        let error = app.create_root("div", &[("broken", "")]).unwrap_err();
        assert_eq!(
            error,
            RuntimeError::UnresolvedForwardRef {
                name: "Missing".to_string()
            }
        );

        let el = app.create_root("div", &[("fine", "")]).unwrap();
        app.detect_changes();
        assert_eq!(*log.borrow(), vec!["Fine.on_init"]);
        assert_eq!(app.directive_names_on(el).unwrap(), vec!["Fine"]);
    }

    #[test]
    fn rebuilding_the_matched_set_is_idempotent() {
        let mut registry = DirectiveRegistry::new();
        let inner = registry.register(DirectiveDefinition::directive("Inner")).unwrap();
        let outer = registry
            .register(DirectiveDefinition::directive("Outer").compose(inner))
            .unwrap();
        let root = registry
            .register(
                DirectiveDefinition::directive("Root")
                    .selector("[root]")
                    .compose(outer),
            )
            .unwrap();

        let first = build_matched_set(&registry, &[root]).unwrap();
        let second = build_matched_set(&registry, &[root]).unwrap();
        assert_eq!(first.def_ids(), second.def_ids());
        assert_eq!(first.principal(), second.principal());
    }

    #[test]
    fn introspection_lists_host_directives_before_their_host() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = DirectiveRegistry::new();

        let comp_helper = registry.register(recorder("CompHelper", &log)).unwrap();
        let mut comp = recorder("Widget", &log).compose(comp_helper);
        comp.is_component = true;
        comp = comp.selector("my-widget");
        registry.register(comp).unwrap();

        let dir_helper = registry.register(recorder("DirHelper", &log)).unwrap();
        registry
            .register(
                recorder("Tooltip", &log)
                    .selector("[tooltip]")
                    .compose(dir_helper),
            )
            .unwrap();

        let mut app = Application::new(registry);
        let el = app.create_root("my-widget", &[("tooltip", "")]).unwrap();

        assert_eq!(
            app.directive_names_on(el).unwrap(),
            vec!["CompHelper", "Widget", "DirHelper", "Tooltip"]
        );

        let summary = app.matched_summary(el).unwrap();
        assert_eq!(summary[0].source, MatchSource::HostDirective);
        assert_eq!(summary[1].source, MatchSource::Selector);
        assert_eq!(summary[2].source, MatchSource::HostDirective);
        assert_eq!(summary[3].source, MatchSource::Selector);

        let widget = app.registry().find("Widget").unwrap();
        assert_eq!(app.component_of(el).unwrap(), Some(widget));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json[0]["name"], "CompHelper");
        assert_eq!(json[1]["source"], "Selector");
    }

    #[test]
    fn alias_for_undeclared_binding_is_rejected() {
        let mut registry = DirectiveRegistry::new();
        let menu = registry
            .register(DirectiveDefinition::directive("Menu").input("open"))
            .unwrap();
        registry
            .register(
                DirectiveDefinition::directive("Host")
                    .selector("[host]")
                    .compose(HostDirectiveEntry::new(menu).expose_input("missing", "alias")),
            )
            .unwrap();

        let mut app = Application::new(registry);
        let error = app.create_root("div", &[("host", "")]).unwrap_err();
        assert_eq!(
            error,
            RuntimeError::UnknownHostDirectiveBinding {
                directive: "Menu".to_string(),
                binding: "missing".to_string()
            }
        );
    }

    #[test]
    fn valid_aliases_are_carried_on_the_matched_entry() {
        let mut registry = DirectiveRegistry::new();
        let menu = registry
            .register(
                DirectiveDefinition::directive("Menu")
                    .input("open")
                    .output("closed"),
            )
            .unwrap();
        let host = registry
            .register(
                DirectiveDefinition::directive("Host")
                    .selector("[host]")
                    .compose(
                        HostDirectiveEntry::new(menu)
                            .expose_input("open", "menuOpen")
                            .expose_output("closed", "menuClosed"),
                    ),
            )
            .unwrap();

        let matched = build_matched_set(&registry, &[host]).unwrap();
        let entry = &matched.entries()[matched.position(menu).unwrap()];
        assert_eq!(entry.exposed_inputs.get("open"), Some(&"menuOpen".to_string()));
        assert_eq!(
            entry.exposed_outputs.get("closed"),
            Some(&"menuClosed".to_string())
        );
    }

    #[test]
    fn duplicate_names_are_rejected_at_registration() {
        let mut registry = DirectiveRegistry::new();
        registry.register(DirectiveDefinition::directive("Dup")).unwrap();
        let error = registry
            .register(DirectiveDefinition::directive("Dup"))
            .unwrap_err();
        assert_eq!(
            error,
            RuntimeError::DuplicateDirectiveName {
                name: "Dup".to_string()
            }
        );
    }
}
