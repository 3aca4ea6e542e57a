use pretty_assertions::assert_eq;
use webidl_bind::ast::{
    Argument, CallbackDecl, DictionaryDecl, ExtendedAttribute, File, IncludesDecl, InterfaceDecl,
    Member, MixinDecl, SyntaxType, TypedefDecl,
};
use webidl_bind::model::{Entity, TypeRef};
use webidl_bind::{compile, CompileError, Context, GeneratorInput, ScriptSource};

fn named(name: &str) -> SyntaxType {
    SyntaxType::named(name)
}

fn promise_of(element: &str) -> SyntaxType {
    SyntaxType::generic("Promise", vec![named(element)])
}

fn compile_ok(files: &[File], scripts: &[ScriptSource]) -> (GeneratorInput, Context) {
    let mut ctx = Context::default();
    let input = match compile(&mut ctx, files, scripts) {
        Ok(input) => input,
        Err(err) => panic!(
            "compilation failed: {}\n{}",
            err,
            ctx.diagnostics.render(Default::default())
        ),
    };
    (input, ctx)
}

fn interface<'a>(input: &'a GeneratorInput, name: &str) -> &'a webidl_bind::model::Interface {
    input
        .table()
        .ids()
        .map(|id| input.entity(id))
        .find(|e| e.key() == name)
        .and_then(Entity::as_interface)
        .unwrap_or_else(|| panic!("no interface `{}`", name))
}

#[test]
fn test_string_promises_share_one_instantiation() {
    let files = [File::new("fetch.idl").with(
        InterfaceDecl::new("Body")
            .member(Member::operation("text", promise_of("DOMString"), vec![]))
            .member(Member::operation("json", promise_of("USVString"), vec![]))
            .member(Member::operation("arrayBuffer", promise_of("ArrayBuffer"), vec![])),
    )];
    let (input, _) = compile_ok(&files, &[]);

    let body = interface(&input, "Body");
    let returns: Vec<&TypeRef> = body.members.methods.iter().map(|m| &m.ret).collect();
    assert_eq!(returns[0], returns[1]);
    assert!(returns[0] != returns[2]);

    let builtin = input.package("builtin").unwrap();
    let names: Vec<&str> = builtin.interfaces.iter().map(|id| input.entity(*id).key()).collect();
    assert_eq!(names, vec!["PromiseArrayBuffer", "PromiseString"]);
    assert_eq!(builtin.callbacks.len(), 4);
}

#[test]
fn test_promise_of_void_is_rejected() {
    let files = [File::new("a.idl")
        .with(InterfaceDecl::new("Lock").member(Member::operation("release", promise_of("void"), vec![])))];
    let mut ctx = Context::default();
    let err = compile(&mut ctx, &files, &[]).unwrap_err();
    assert_eq!(err, CompileError::Aborted { stage: "promise", errors: 1 });
    assert_eq!(ctx.diagnostics.count_code("E012"), 1);
}

#[test]
fn test_nested_string_promise_is_named_and_aliased() {
    let names = SyntaxType::generic("Promise", vec![SyntaxType::sequence(named("DOMString")).nullable()]);
    let files = [File::new("dom.idl")
        .with(InterfaceDecl::new("Directory").member(Member::operation("list", names, vec![])))];
    let (input, _) = compile_ok(&files, &[]);

    let ret = &interface(&input, "Directory").members.methods[0].ret;
    let TypeRef::Interface(id) = ret else {
        panic!("expected an instantiated promise, got {:?}", ret);
    };
    let promise = input.entity(*id);
    assert_eq!(promise.key(), "PromiseNilSequenceString");
    assert_eq!(promise.basic().package, "builtin");

    let instance = input.table().promise("sequence<DOMString>?").unwrap();
    assert_eq!(instance.interface, *id);
    assert_eq!(input.table().promise("sequence<USVString>?"), Some(instance));
    assert_eq!(input.entity(instance.on_fulfilled).key(), "PromiseNilSequenceStringOnFulfilled");
}

#[test]
fn test_promise_shared_across_files() {
    let files = [
        File::new("fetch.idl")
            .with(InterfaceDecl::new("Response"))
            .with(InterfaceDecl::new("Window").member(Member::operation("fetch", promise_of("Response"), vec![]))),
        File::new("sw.idl").with(
            InterfaceDecl::new("FetchEvent").member(Member::operation("preloadResponse", promise_of("Response"), vec![])),
        ),
    ];
    let (input, _) = compile_ok(&files, &[]);

    let window = &interface(&input, "Window").members.methods[0].ret;
    let event = &interface(&input, "FetchEvent").members.methods[0].ret;
    assert_eq!(window, event);
    let TypeRef::Interface(id) = window else {
        panic!("expected an instantiated promise, got {:?}", window);
    };
    assert_eq!(input.entity(*id).key(), "PromiseResponse");
    // The first user decides the package.
    assert_eq!(input.entity(*id).basic().package, "fetch");
    assert_eq!(input.table().promises().count(), 1);
}

#[test]
fn test_promise_without_one_argument_is_rejected() {
    let files = [File::new("a.idl").with(
        InterfaceDecl::new("Lock")
            .member(Member::operation("acquire", SyntaxType::generic("Promise", vec![]), vec![]))
            .member(Member::operation(
                "pair",
                SyntaxType::generic("Promise", vec![named("long"), named("long")]),
                vec![],
            )),
    )];
    let mut ctx = Context::default();
    let err = compile(&mut ctx, &files, &[]).unwrap_err();
    assert_eq!(err, CompileError::Aborted { stage: "promise", errors: 2 });
    assert_eq!(ctx.diagnostics.count_code("E019"), 2);
    let messages: Vec<String> = ctx.diagnostics.diagnostics().iter().map(|d| d.issue.to_string()).collect();
    assert_eq!(
        messages,
        vec![
            "Promise takes exactly one type argument, found 0",
            "Promise takes exactly one type argument, found 2",
        ]
    );
}

#[test]
fn test_inherited_overrides_are_suffixed() {
    let foo = || Member::operation("foo", named("void"), vec![]);
    let files = [File::new("a.idl")
        .with(InterfaceDecl::new("A").member(foo()))
        .with(InterfaceDecl::new("B").inherits("A").member(foo()))
        .with(InterfaceDecl::new("C").inherits("B").member(foo()))];
    let (input, _) = compile_ok(&files, &[]);
    for (name, method) in [("A", "Foo"), ("B", "Foo2"), ("C", "Foo3")] {
        assert_eq!(interface(&input, name).members.methods[0].name, method);
    }
}

#[test]
fn test_mixins_and_partials_before_linking() {
    let files = [
        File::new("dom.idl")
            .with(InterfaceDecl::new("Document"))
            .with(IncludesDecl::new("Document", "NonElementParentNode"))
            .with(
                MixinDecl::new("NonElementParentNode")
                    .member(Member::operation("getElementById", named("Element"), vec![Argument::new("id", named("DOMString"))])),
            ),
        File::new("html.idl")
            .with(InterfaceDecl::new("Element"))
            .with(InterfaceDecl::new("Document").partial().member(Member::attribute("title", named("DOMString")))),
    ];
    let (input, _) = compile_ok(&files, &[]);
    let document = interface(&input, "Document");
    assert_eq!(document.members.methods[0].name, "GetElementById");
    assert!(matches!(document.members.methods[0].ret, TypeRef::Interface(_)));
    assert_eq!(document.members.vars[0].idl, "title");
    // Package comes from the file that declared the base.
    assert_eq!(document.basic.package, "dom");
}

#[test]
fn test_typedefs_and_dictionaries_resolve() {
    let files = [File::new("a.idl")
        .with(TypedefDecl::new("Callbacks", SyntaxType::sequence(named("Listener"))))
        .with(CallbackDecl::new("Listener", named("void"), vec![Argument::new("event", named("Init"))]))
        .with(DictionaryDecl::new("Init").member("bubbles", named("boolean")))
        .with(InterfaceDecl::new("Target").member(Member::attribute("listeners", named("Callbacks"))))];
    let (input, _) = compile_ok(&files, &[]);
    let a = input.package("a").unwrap();
    assert_eq!(a.callbacks.len(), 1);
    assert_eq!(a.dictionaries.len(), 1);
    assert!(matches!(
        &interface(&input, "Target").members.vars[0].ty,
        TypeRef::Sequence(inner) if matches!(**inner, TypeRef::Callback(_))
    ));
}

#[test]
fn test_callback_interface_constraints() {
    let cases: Vec<(InterfaceDecl, &str)> = vec![
        (InterfaceDecl::new("Cb").callback().inherits("Base"), "E013"),
        (
            InterfaceDecl::new("Cb").callback().annotate(ExtendedAttribute::new("Global")),
            "E014",
        ),
        (InterfaceDecl::new("Cb").callback().member(Member::constructor(vec![])), "E015"),
        (
            InterfaceDecl::new("Cb").callback().member(Member::attribute("x", named("long"))),
            "E016",
        ),
        (
            InterfaceDecl::new("Cb")
                .callback()
                .member(Member::operation("make", named("void"), vec![]).static_member()),
            "E017",
        ),
    ];
    for (decl, code) in cases {
        let files = [File::new("a.idl").with(InterfaceDecl::new("Base")).with(decl)];
        let mut ctx = Context::default();
        let err = compile(&mut ctx, &files, &[]).unwrap_err();
        assert_eq!(err, CompileError::Aborted { stage: "extract", errors: 1 }, "{}", code);
        assert_eq!(ctx.diagnostics.count_code(code), 1, "{}", code);
    }
}

#[test]
fn test_script_renames_and_relocates() {
    let files = [File::new("html.idl").with(
        InterfaceDecl::new("HTMLElement").member(Member::attribute("idName", named("DOMString"))),
    )];
    let scripts = [ScriptSource::new(
        "html.tr",
        "## HTMLElement\n.package = pkg/html\nidName = TargetName\n",
    )];
    let (input, _) = compile_ok(&files, &scripts);
    let element = interface(&input, "HTMLElement");
    assert_eq!(element.basic.package, "pkg/html");
    assert_eq!(element.members.vars[0].name, "TargetName");
    assert!(input.package("pkg/html").is_some());
    assert!(input.package("html").is_none());
}

#[test]
fn test_script_with_missing_member_changes_nothing() {
    let files = [File::new("html.idl").with(
        InterfaceDecl::new("HTMLElement").member(Member::attribute("idName", named("DOMString"))),
    )];
    let scripts = [ScriptSource::new(
        "html.tr",
        "## HTMLElement\n.package = pkg/html\nmissing = TargetName\n",
    )];
    let mut ctx = Context::default();
    let err = compile(&mut ctx, &files, &scripts).unwrap_err();
    assert_eq!(err, CompileError::Aborted { stage: "transform", errors: 1 });
    assert_eq!(ctx.diagnostics.count_code("E037"), 1);

    let id = ctx.table.lookup_type("HTMLElement").unwrap();
    let element = ctx.table.entity(id).as_interface().unwrap();
    assert_eq!(element.basic.package, "html");
    assert_eq!(element.members.vars[0].name, "IdName");
}

#[test]
fn test_error_limit_stops_early() {
    let mut file = File::new("a.idl");
    for i in 0..20 {
        file = file.with(
            InterfaceDecl::new(format!("I{}", i)).member(Member::attribute("x", named("Missing"))),
        );
    }
    let mut ctx = Context::default();
    let err = compile(&mut ctx, &[file], &[]).unwrap_err();
    assert_eq!(err, CompileError::TooManyErrors);
    assert_eq!(ctx.diagnostics.error_count(), 11);
}
