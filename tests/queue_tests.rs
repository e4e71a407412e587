use wan_orchestrator::scheduler::{JobQueue, ResourceRequest};

#[test]
fn test_cancel_in_the_middle_shifts_positions() {
    let mut queue = JobQueue::new();
    for id in ["a", "b", "c", "d"] {
        queue.submit(id, "t2v-A14B", ResourceRequest::Count(1)).unwrap();
    }

    assert!(queue.cancel("b"));

    assert_eq!(queue.position("a"), Some(0));
    assert_eq!(queue.position("b"), None);
    assert_eq!(queue.position("c"), Some(1));
    assert_eq!(queue.position("d"), Some(2));
    let order: Vec<&str> = queue.entries().map(|e| e.job_id.as_str()).collect();
    assert_eq!(order, vec!["a", "c", "d"]);
}

#[test]
fn test_service_order_is_submission_order() {
    let mut queue = JobQueue::new();
    queue.submit("first", "t2v-A14B", ResourceRequest::Count(4)).unwrap();
    queue.submit("second", "ti2v-5B", ResourceRequest::Count(1)).unwrap();
    queue.submit("third", "s2v-14B", ResourceRequest::ids([2])).unwrap();

    let mut served = Vec::new();
    while let Some(head) = queue.head().map(|e| e.job_id.clone()) {
        // Only the head may leave through pop_if_head
        for other in queue.entries().skip(1).map(|e| e.job_id.clone()).collect::<Vec<_>>() {
            assert!(!queue.pop_if_head(&other));
        }
        assert!(queue.pop_if_head(&head));
        served.push(head);
    }

    assert_eq!(served, vec!["first", "second", "third"]);
    assert!(queue.is_empty());
}

#[test]
fn test_entries_keep_request_and_label() {
    let mut queue = JobQueue::new();
    queue.submit("a", "s2v-14B", ResourceRequest::ids([1, 3])).unwrap();

    let entry = queue.get("a").unwrap();
    assert_eq!(entry.task_label, "s2v-14B");
    assert_eq!(entry.request, ResourceRequest::ids([1, 3]));
    assert_eq!(entry.request.count(), 2);
    assert!(entry.submitted_at <= chrono::Utc::now());
}

#[test]
fn test_unknown_job_operations_are_noops() {
    let mut queue = JobQueue::new();
    queue.submit("a", "t2v-A14B", ResourceRequest::Count(1)).unwrap();

    assert!(!queue.cancel("ghost"));
    assert!(!queue.pop_if_head("ghost"));
    assert!(!queue.is_head("ghost"));
    assert_eq!(queue.len(), 1);
}
