//! Tests for definition building, trait precedence, singleton caching and
//! string-based trait resolution.

use clasp::{
    ClaspError, ConflictPolicy, Definition, Members, ModuleResolver, Namespace, ResolvedModule,
    Value,
};

// ============================================================================
// Trait precedence
// ============================================================================

mod precedence_tests {
    use super::*;

    fn trait_a() -> Members {
        Members::new().set("from_a", 1).set("shared", "a")
    }

    fn trait_b() -> Members {
        Members::new().set("from_b", 2).set("shared", "b")
    }

    #[test]
    fn test_later_trait_overrides_earlier() {
        let definition = Definition::new();
        definition.with_trait(trait_a()).unwrap();
        definition.with_trait(trait_b()).unwrap();
        let instance = definition.load(&[]).unwrap();
        assert_eq!(instance.get("from_a"), Some(Value::Int(1)));
        assert_eq!(instance.get("from_b"), Some(Value::Int(2)));
        assert_eq!(instance.get("shared"), Some(Value::Str("b".to_string())));
    }

    #[test]
    fn test_own_members_override_all_traits() {
        let definition = Definition::new();
        definition.with_trait(trait_a()).unwrap();
        definition.with_trait(trait_b()).unwrap();
        definition.define(Members::new().set("shared", "own"));
        let instance = definition.load(&[]).unwrap();
        assert_eq!(instance.get("shared"), Some(Value::Str("own".to_string())));
    }

    #[test]
    fn test_precedence_keeps_first_declaration_order() {
        // Overriding a name changes its value, not its position.
        let definition = Definition::new();
        definition.with_trait(trait_a()).unwrap();
        definition.with_trait(trait_b()).unwrap();
        let instance = definition.load(&[]).unwrap();
        assert_eq!(
            instance.keys(),
            vec![
                "from_a".to_string(),
                "shared".to_string(),
                "from_b".to_string()
            ]
        );
    }

    #[test]
    fn test_first_wins_policy() {
        let definition = Definition::new();
        definition.conflict_policy(ConflictPolicy::FirstWins);
        definition.with_trait(trait_a()).unwrap();
        definition.with_trait(trait_b()).unwrap();
        definition.define(Members::new().set("shared", "own"));
        let instance = definition.load(&[]).unwrap();
        assert_eq!(instance.get("shared"), Some(Value::Str("a".to_string())));
        assert_eq!(instance.get("from_b"), Some(Value::Int(2)));
    }

    #[test]
    fn test_diamond_trait_is_merged_once() {
        let namespace = Namespace::new();
        let base = namespace.define();
        base.define(Members::new().set("root_marker", 1));
        let left = namespace.define();
        left.with_trait(&base).unwrap();
        left.define(Members::new().set("left_marker", 2));
        let right = namespace.define();
        right.with_trait(&base).unwrap();
        right.define(Members::new().set("right_marker", 3));
        let tip = namespace.define();
        tip.with_trait(&left).unwrap();
        tip.with_trait(&right).unwrap();
        // base, left, right, tip: the shared base level appears once.
        assert_eq!(tip.blueprint().unwrap().lineage().len(), 4);
        let instance = tip.load(&[]).unwrap();
        assert_eq!(instance.get("root_marker"), Some(Value::Int(1)));
        assert_eq!(instance.get("left_marker"), Some(Value::Int(2)));
        assert_eq!(instance.get("right_marker"), Some(Value::Int(3)));
    }
}

// ============================================================================
// Instantiation
// ============================================================================

mod instantiation_tests {
    use super::*;

    #[test]
    fn test_instances_do_not_share_nested_state() {
        let definition = clasp::define(
            Members::new().set("config", Value::map(vec![("retries", Value::Int(3))])),
        );
        let first = definition.load(&[]).unwrap();
        let second = definition.load(&[]).unwrap();
        assert!(!first.same(&second));
        if let Some(Value::Map(map)) = first.get("config") {
            map.borrow_mut().insert("retries".to_string(), Value::Int(9));
        }
        let untouched = second.get("config").unwrap();
        assert_eq!(
            untouched.as_map().unwrap().borrow().get("retries"),
            Some(&Value::Int(3))
        );
    }

    #[test]
    fn test_factory_members_run_per_instance() {
        let definition = Definition::new();
        definition.define_with(|| Members::new().set("items", Value::empty_list()));
        let first = definition.load(&[]).unwrap();
        let second = definition.load(&[]).unwrap();
        if let Some(Value::List(list)) = first.get("items") {
            list.borrow_mut().push(Value::Int(1));
        }
        let other = second.get("items").unwrap();
        assert!(other.as_list().unwrap().borrow().is_empty());
    }

    #[test]
    fn test_construct_receives_load_arguments() {
        let definition = clasp::define(Members::new().method("___construct", |scope, args| {
            scope.set("first_arg", args.get(0).cloned().unwrap_or(Value::Null));
            Ok(Value::Null)
        }));
        let instance = definition.load(&[Value::from(42)]).unwrap();
        assert_eq!(instance.get("first_arg"), Some(Value::Int(42)));
    }
}

// ============================================================================
// Singleton caching
// ============================================================================

mod singleton_tests {
    use super::*;

    #[test]
    fn test_singleton_loads_share_one_instance() {
        let definition = clasp::define(Members::new().set("counter", 0));
        definition.singleton(true);
        let first = definition.load(&[]).unwrap();
        let second = definition.load(&[]).unwrap();
        assert!(first.same(&second));
        first.set("counter", 7);
        assert_eq!(second.get("counter"), Some(Value::Int(7)));
    }

    #[test]
    fn test_singleton_reuse_ignores_arguments() {
        let definition = clasp::define(Members::new().method("___construct", |scope, args| {
            scope.set("init", args.get(0).cloned().unwrap_or(Value::Null));
            Ok(Value::Null)
        }));
        definition.singleton(true);
        let first = definition.load(&[Value::from("original")]).unwrap();
        let second = definition.load(&[Value::from("different")]).unwrap();
        assert!(first.same(&second));
        assert_eq!(second.get("init"), Some(Value::Str("original".to_string())));
    }

    #[test]
    fn test_non_singleton_loads_are_distinct() {
        let definition = clasp::define(Members::new().set("counter", 0));
        let first = definition.load(&[]).unwrap();
        let second = definition.load(&[]).unwrap();
        assert!(!first.same(&second));
        first.set("counter", 7);
        assert_eq!(second.get("counter"), Some(Value::Int(0)));
    }
}

// ============================================================================
// Named and path-based trait resolution
// ============================================================================

mod resolution_tests {
    use super::*;

    #[test]
    fn test_registered_name_resolves_as_trait() {
        let namespace = Namespace::new();
        let logging = namespace.define();
        logging.define(Members::new().set("log_level", "info"));
        logging.register("logging");
        let service = namespace.define();
        service.with_trait("logging").unwrap();
        let instance = service.load(&[]).unwrap();
        assert_eq!(
            instance.get("log_level"),
            Some(Value::Str("info".to_string()))
        );
    }

    #[test]
    fn test_last_registration_wins() {
        let namespace = Namespace::new();
        let old = namespace.define();
        old.define(Members::new().set("version", 1));
        namespace.register("widget", old);
        let new = namespace.define();
        new.define(Members::new().set("version", 2));
        namespace.register("widget", new);
        let user = namespace.define();
        user.with_trait("widget").unwrap();
        let instance = user.load(&[]).unwrap();
        assert_eq!(instance.get("version"), Some(Value::Int(2)));
    }

    #[test]
    fn test_names_lists_registered_definitions() {
        let namespace = Namespace::new();
        namespace.define().register("logging");
        namespace.define().register("metrics");
        let mut names = namespace.names();
        names.sort();
        assert_eq!(names, vec!["logging".to_string(), "metrics".to_string()]);
    }

    #[test]
    fn test_unresolvable_name_is_an_error() {
        let definition = Definition::new();
        assert!(matches!(
            definition.with_trait("no/such/module"),
            Err(ClaspError::Resolution(_))
        ));
    }

    struct FixtureResolver;

    impl ModuleResolver for FixtureResolver {
        fn can_resolve(&self, path: &str) -> bool {
            path.ends_with("widgets/chrome") || path.ends_with("widgets/base")
        }

        fn resolve(&self, path: &str) -> Option<ResolvedModule> {
            if path.ends_with("widgets/base") {
                let base = Definition::new();
                base.define(Members::new().set("kind", "base"));
                Some(ResolvedModule::Definition(base))
            } else {
                Some(ResolvedModule::Members(
                    Members::new().set("kind", "chrome"),
                ))
            }
        }

        fn name(&self) -> &str {
            "fixture"
        }
    }

    #[test]
    fn test_path_reference_resolves_to_members() {
        let namespace = Namespace::new();
        namespace.add_resolver(Box::new(FixtureResolver));
        let definition = namespace.define();
        definition.with_trait("widgets/chrome").unwrap();
        let instance = definition.load(&[]).unwrap();
        assert_eq!(instance.get("kind"), Some(Value::Str("chrome".to_string())));
    }

    #[test]
    fn test_path_reference_resolves_to_definition() {
        let namespace = Namespace::new();
        namespace.add_resolver(Box::new(FixtureResolver));
        let definition = namespace.define();
        definition.with_trait("widgets/base").unwrap();
        let instance = definition.load(&[]).unwrap();
        assert_eq!(instance.get("kind"), Some(Value::Str("base".to_string())));
    }

    #[test]
    fn test_registry_is_consulted_before_resolvers() {
        let namespace = Namespace::new();
        namespace.add_resolver(Box::new(FixtureResolver));
        let registered = namespace.define();
        registered.define(Members::new().set("kind", "registered"));
        namespace.register("widgets/chrome", registered);
        let definition = namespace.define();
        definition.with_trait("widgets/chrome").unwrap();
        let instance = definition.load(&[]).unwrap();
        assert_eq!(
            instance.get("kind"),
            Some(Value::Str("registered".to_string()))
        );
    }

    #[test]
    fn test_extend_rejects_definition_sources() {
        let namespace = Namespace::new();
        let parent = namespace.define();
        parent.define(Members::new().set("base", 1));
        let other = namespace.define();
        namespace.register("widgets/other", other);
        assert!(matches!(
            parent.extend("widgets/other"),
            Err(ClaspError::Resolution(_))
        ));
    }
}
