// Copyright 2016 Benoît Labaere (benoit.labaere@gmail.com)
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0>
// or the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// This file may not be copied, modified, or distributed except according to those terms.

#[macro_use]
extern crate log;
extern crate env_logger;
extern crate rand;
extern crate scalemq;

use std::collections::HashSet;
use std::io;
use std::thread;
use std::time;

use scalemq::*;

#[test]
fn test_inproc_pair_echo() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut connected = session.create_socket(SocketType::Pair).unwrap();

    bound.set_recv_timeout(time::Duration::from_millis(250)).unwrap();
    bound.bind("inproc://echo").unwrap();

    connected.set_send_timeout(time::Duration::from_millis(250)).unwrap();
    connected.connect("inproc://echo").unwrap();

    connected.send(b"hello".to_vec()).unwrap();
    let received = bound.recv().unwrap();
    assert_eq!(b"hello".to_vec(), received);

    bound.send(b"world".to_vec()).unwrap();
    let received = connected.recv().unwrap();
    assert_eq!(b"world".to_vec(), received);
}

#[test]
fn test_pair_preserves_message_parts() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut connected = session.create_socket(SocketType::Pair).unwrap();

    bound.bind("inproc://parts").unwrap();
    connected.connect("inproc://parts").unwrap();

    let msg = Message::with_header_and_body(vec![9, 9], vec![65, 66, 67]);

    connected.send_msg(msg).unwrap();

    let received = bound.recv_msg().unwrap();

    assert_eq!(vec![9, 9], received.header);
    assert_eq!(&[65, 66, 67], received.body());
}

#[test]
fn test_pair_accepts_a_single_peer() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut first = session.create_socket(SocketType::Pair).unwrap();
    let mut second = session.create_socket(SocketType::Pair).unwrap();

    bound.bind("inproc://single").unwrap();
    first.connect("inproc://single").unwrap();
    second.connect("inproc://single").unwrap();

    thread::sleep(time::Duration::from_millis(100));

    first.send(b"from first".to_vec()).unwrap();

    bound.set_recv_timeout(time::Duration::from_millis(250)).unwrap();
    assert_eq!(b"from first".to_vec(), bound.recv().unwrap());

    let _ = second.set_send_timeout(time::Duration::from_millis(100));
    let _ = second.send(b"from second".to_vec());

    let err = bound.recv().unwrap_err();
    assert_eq!(io::ErrorKind::TimedOut, err.kind());
}

#[test]
fn test_pipeline_connected_to_bound() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();

    pull.bind("inproc://pipeline").unwrap();
    push.connect("inproc://pipeline").unwrap();

    let sent = vec![65, 66, 67];
    push.send(sent).unwrap();
    let received = pull.recv().unwrap();

    assert_eq!(vec![65, 66, 67], received)
}

#[test]
fn test_send_while_not_connected() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let timeout = time::Duration::from_millis(500);

    push.set_send_timeout(timeout).unwrap();
    push.connect("inproc://late-bind").unwrap();

    let sender = thread::spawn(move || {
        push.send(vec![65, 66, 67]).unwrap();
        info!("test_send_while_not_connected: msg sent");
    });

    thread::sleep(time::Duration::from_millis(50));
    pull.bind("inproc://late-bind").unwrap();

    let received = pull.recv().unwrap();
    assert_eq!(vec![65, 66, 67], received);

    sender.join().unwrap();
}

#[test]
fn test_send_timeout() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();
    let timeout = time::Duration::from_millis(50);

    push.bind("inproc://send-timeout").unwrap();
    push.set_send_timeout(timeout).unwrap();

    let err = push.send(vec![65, 66, 67]).unwrap_err();

    assert_eq!(io::ErrorKind::TimedOut, err.kind());
}

#[test]
fn test_recv_timeout() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();
    let timeout = time::Duration::from_millis(50);

    pull.set_recv_timeout(timeout).unwrap();
    pull.bind("inproc://recv-timeout").unwrap();
    push.connect("inproc://recv-timeout").unwrap();

    let err = pull.recv().unwrap_err();

    assert_eq!(io::ErrorKind::TimedOut, err.kind());
}

#[test]
fn test_try_send_and_try_recv_do_not_wait() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();

    pull.bind("inproc://nonblock").unwrap();

    let err = push.try_send(vec![65]).unwrap_err();
    assert_eq!(io::ErrorKind::WouldBlock, err.kind());

    let err = pull.try_recv().unwrap_err();
    assert_eq!(io::ErrorKind::WouldBlock, err.kind());

    push.connect("inproc://nonblock").unwrap();
    thread::sleep(time::Duration::from_millis(100));

    push.try_send(vec![65]).unwrap();
    thread::sleep(time::Duration::from_millis(100));
    assert_eq!(vec![65], pull.try_recv().unwrap());
}

#[test]
fn test_pipeline_fans_out_fairly() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();
    let mut pull_a = session.create_socket(SocketType::Pull).unwrap();
    let mut pull_b = session.create_socket(SocketType::Pull).unwrap();
    let timeout = time::Duration::from_millis(100);

    pull_a.bind("inproc://fanout-a").unwrap();
    pull_b.bind("inproc://fanout-b").unwrap();
    push.connect("inproc://fanout-a").unwrap();
    push.connect("inproc://fanout-b").unwrap();

    thread::sleep(time::Duration::from_millis(100));

    for value in 0..100u8 {
        push.send(vec![value]).unwrap();
    }

    pull_a.set_recv_timeout(timeout).unwrap();
    pull_b.set_recv_timeout(timeout).unwrap();

    let mut union = HashSet::new();
    let mut count_a = 0;
    let mut count_b = 0;

    while let Ok(buffer) = pull_a.recv() {
        count_a += 1;
        union.insert(buffer[0]);
    }
    while let Ok(buffer) = pull_b.recv() {
        count_b += 1;
        union.insert(buffer[0]);
    }

    assert_eq!(100, count_a + count_b);
    assert!((count_a as i32 - count_b as i32).abs() <= 1);

    let expected: HashSet<u8> = (0..100u8).collect();
    assert_eq!(expected, union);
}

#[test]
fn test_pub_sub_prefix_filter() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut publisher = session.create_socket(SocketType::Pub).unwrap();
    let mut subscriber = session.create_socket(SocketType::Sub).unwrap();
    let timeout = time::Duration::from_millis(100);

    publisher.bind("inproc://news").unwrap();
    subscriber.connect("inproc://news").unwrap();
    subscriber.set_recv_timeout(timeout).unwrap();
    subscriber.set_option(SocketOption::Subscribe("BTC".to_string())).unwrap();

    thread::sleep(time::Duration::from_millis(100));

    publisher.send(b"BTC:10".to_vec()).unwrap();
    publisher.send(b"ETH:2".to_vec()).unwrap();
    publisher.send(b"BTC:11".to_vec()).unwrap();

    assert_eq!(b"BTC:10".to_vec(), subscriber.recv().unwrap());
    assert_eq!(b"BTC:11".to_vec(), subscriber.recv().unwrap());

    let err = subscriber.recv().unwrap_err();
    assert_eq!(io::ErrorKind::TimedOut, err.kind());
}

#[test]
fn test_unsubscribe_stops_the_delivery() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut publisher = session.create_socket(SocketType::Pub).unwrap();
    let mut subscriber = session.create_socket(SocketType::Sub).unwrap();
    let timeout = time::Duration::from_millis(100);

    publisher.bind("inproc://weather").unwrap();
    subscriber.connect("inproc://weather").unwrap();
    subscriber.set_recv_timeout(timeout).unwrap();
    subscriber.set_option(SocketOption::Subscribe("rain".to_string())).unwrap();

    thread::sleep(time::Duration::from_millis(100));

    publisher.send(b"rain:today".to_vec()).unwrap();
    assert_eq!(b"rain:today".to_vec(), subscriber.recv().unwrap());

    subscriber.set_option(SocketOption::Unsubscribe("rain".to_string())).unwrap();
    publisher.send(b"rain:tomorrow".to_vec()).unwrap();

    let err = subscriber.recv().unwrap_err();
    assert_eq!(io::ErrorKind::TimedOut, err.kind());

    let err = subscriber.set_option(SocketOption::Unsubscribe("snow".to_string())).unwrap_err();
    assert_eq!(io::ErrorKind::InvalidInput, err.kind());
}

#[test]
fn test_req_rep() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Rep).unwrap();
    let mut client = session.create_socket(SocketType::Req).unwrap();

    server.bind("inproc://req-rep").unwrap();
    client.connect("inproc://req-rep").unwrap();

    let client_request = vec![65, 66, 67];
    client.send(client_request).unwrap();

    let server_request = server.recv().unwrap();
    assert_eq!(vec![65, 66, 67], server_request);

    let server_reply = vec![67, 66, 65];
    server.send(server_reply).unwrap();

    let client_reply = client.recv().unwrap();

    assert_eq!(vec![67, 66, 65], client_reply);
}

#[test]
fn test_send_reply_before_recv_request() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Rep).unwrap();

    server.bind("inproc://rep-no-request").unwrap();
    server.send(vec![67, 66, 65]).unwrap_err();
}

#[test]
fn test_recv_reply_before_send_request() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Rep).unwrap();
    let mut client = session.create_socket(SocketType::Req).unwrap();

    server.bind("inproc://req-no-send").unwrap();
    client.connect("inproc://req-no-send").unwrap();

    let err = client.recv().unwrap_err();
    assert_eq!(io::ErrorKind::Other, err.kind());
}

#[test]
fn test_req_resend_reaches_another_peer() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut idle_server = session.create_socket(SocketType::Rep).unwrap();
    let mut live_server = session.create_socket(SocketType::Rep).unwrap();
    let mut client = session.create_socket(SocketType::Req).unwrap();

    idle_server.bind("inproc://resend-idle").unwrap();
    live_server.bind("inproc://resend-live").unwrap();

    client.set_option(SocketOption::ResendInterval(time::Duration::from_millis(200))).unwrap();
    client.connect("inproc://resend-idle").unwrap();
    client.connect("inproc://resend-live").unwrap();

    thread::sleep(time::Duration::from_millis(100));

    client.send(b"q".to_vec()).unwrap();

    // The idle server never reads; after the resend interval the same
    // request must show up at the live one.
    live_server.set_recv_timeout(time::Duration::from_millis(1000)).unwrap();
    let request = live_server.recv().unwrap();
    assert_eq!(b"q".to_vec(), request);

    live_server.send(b"a".to_vec()).unwrap();

    client.set_recv_timeout(time::Duration::from_millis(1000)).unwrap();
    let reply = client.recv().unwrap();
    assert_eq!(b"a".to_vec(), reply);

    drop(idle_server);
}

#[test]
fn test_survey() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Surveyor).unwrap();
    let mut client1 = session.create_socket(SocketType::Respondent).unwrap();
    let mut client2 = session.create_socket(SocketType::Respondent).unwrap();
    let timeout = time::Duration::from_millis(250);

    server.bind("inproc://survey").unwrap();
    client1.connect("inproc://survey").unwrap();
    client2.connect("inproc://survey").unwrap();
    client1.set_recv_timeout(timeout).unwrap();
    client2.set_recv_timeout(timeout).unwrap();
    server.set_recv_timeout(timeout).unwrap();

    thread::sleep(time::Duration::from_millis(100));

    let server_survey = vec![65, 66, 67];
    server.send(server_survey).expect("Server should have sent the survey");

    let client1_survey = client1.recv().expect("Client #1 should have received the survey");
    assert_eq!(vec![65, 66, 67], client1_survey);

    let client2_survey = client2.recv().expect("Client #2 should have received the survey");
    assert_eq!(vec![65, 66, 67], client2_survey);

    client1.send(vec![65, 66, 65]).expect("Client #1 should have sent a vote");
    let server_resp1 = server.recv().expect("Server should have received the vote from client #1");
    assert_eq!(vec![65, 66, 65], server_resp1);

    client2.send(vec![67, 66, 67]).expect("Client #2 should have sent a vote");
    let server_resp2 = server.recv().expect("Server should have received the vote from client #2");
    assert_eq!(vec![67, 66, 67], server_resp2);
}

#[test]
fn test_survey_deadline() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Surveyor).unwrap();
    let mut fast1 = session.create_socket(SocketType::Respondent).unwrap();
    let mut fast2 = session.create_socket(SocketType::Respondent).unwrap();
    let mut slow = session.create_socket(SocketType::Respondent).unwrap();
    let timeout = time::Duration::from_millis(250);
    let deadline = time::Duration::from_millis(150);

    server.set_option(SocketOption::SurveyDeadline(deadline)).unwrap();
    server.bind("inproc://deadline").unwrap();
    fast1.connect("inproc://deadline").unwrap();
    fast2.connect("inproc://deadline").unwrap();
    slow.connect("inproc://deadline").unwrap();
    server.set_recv_timeout(timeout).unwrap();
    fast1.set_recv_timeout(timeout).unwrap();
    fast2.set_recv_timeout(timeout).unwrap();
    slow.set_recv_timeout(timeout).unwrap();

    thread::sleep(time::Duration::from_millis(100));

    server.send(vec![81]).unwrap();

    assert_eq!(vec![81], fast1.recv().unwrap());
    assert_eq!(vec![81], fast2.recv().unwrap());
    assert_eq!(vec![81], slow.recv().unwrap());

    fast1.send(vec![1]).unwrap();
    fast2.send(vec![2]).unwrap();

    assert_eq!(vec![1], server.recv().unwrap());
    assert_eq!(vec![2], server.recv().unwrap());

    // The deadline elapses before the slow respondent answers.
    thread::sleep(time::Duration::from_millis(200));
    slow.send(vec![3]).unwrap();

    let err = server.recv().unwrap_err();
    assert_eq!(io::ErrorKind::TimedOut, err.kind());
}

#[test]
fn test_bus() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::Bus).unwrap();
    let mut client1 = session.create_socket(SocketType::Bus).unwrap();
    let mut client2 = session.create_socket(SocketType::Bus).unwrap();
    let timeout = time::Duration::from_millis(100);

    server.bind("inproc://bus").unwrap();
    client1.connect("inproc://bus").unwrap();
    client2.connect("inproc://bus").unwrap();
    server.set_recv_timeout(timeout).unwrap();
    client1.set_recv_timeout(timeout).unwrap();
    client2.set_recv_timeout(timeout).unwrap();

    thread::sleep(time::Duration::from_millis(100));

    let sent = vec![65, 66, 67];
    server.send(sent).expect("Server should have sent a msg");
    let received1 = client1.recv().expect("Client #1 should have received the msg");
    assert_eq!(vec![65, 66, 67], received1);
    let received2 = client2.recv().expect("Client #2 should have received the msg");
    assert_eq!(vec![65, 66, 67], received2);

    client1.send(vec![66]).expect("Client #1 should have sent a msg");
    assert_eq!(vec![66], server.recv().expect("Server should have received the msg"));

    // There is no path between the two connected nodes.
    let err = client2.recv().unwrap_err();
    assert_eq!(io::ErrorKind::TimedOut, err.kind());
}

#[test]
fn test_raw_request_exposes_the_envelope() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut server = session.create_socket(SocketType::XRep).unwrap();
    let mut client = session.create_socket(SocketType::XReq).unwrap();

    server.bind("inproc://raw").unwrap();
    client.connect("inproc://raw").unwrap();

    let request = Message::with_header_and_body(vec![0x80, 0, 0, 1], vec![65]);

    client.send_msg(request).unwrap();

    let server_side = server.recv_msg().unwrap();

    // Route entry plus the request id put there by the client.
    assert_eq!(8, server_side.header.len());
    assert_eq!(&[0x80, 0, 0, 1], &server_side.header[4..]);
    assert_eq!(&[65], server_side.body());

    let reply = Message::with_header_and_body(server_side.header.clone(), vec![66]);

    server.send_msg(reply).unwrap();

    let client_side = client.recv_msg().unwrap();

    assert_eq!(vec![0x80, 0, 0, 1], client_side.header);
    assert_eq!(&[66], client_side.body());
}

#[test]
fn test_linger_drains_pending_sends() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();

    pull.set_option(SocketOption::RecvBuffer(16)).unwrap();
    pull.bind("inproc://linger").unwrap();

    push.set_linger(time::Duration::from_millis(1000)).unwrap();
    push.connect("inproc://linger").unwrap();

    thread::sleep(time::Duration::from_millis(100));

    let mut sent = 0;

    loop {
        match push.try_send(vec![7; 8]) {
            Ok(_) => sent += 1,
            Err(e) => {
                assert_eq!(io::ErrorKind::WouldBlock, e.kind());
                break;
            }
        }
    }

    assert!(sent >= 2);

    let start = time::Instant::now();
    let closer = thread::spawn(move || {
        push.close().unwrap();
    });

    pull.set_recv_timeout(time::Duration::from_millis(500)).unwrap();

    let mut received = 0;

    while let Ok(buffer) = pull.recv() {
        assert_eq!(vec![7; 8], buffer);
        received += 1;
    }

    closer.join().unwrap();

    assert_eq!(sent, received);
    assert!(start.elapsed() < time::Duration::from_millis(1500));
}

#[test]
fn test_endpoint_shutdown_tears_the_pipe_down() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut connected = session.create_socket(SocketType::Pair).unwrap();
    let timeout = time::Duration::from_millis(200);

    bound.bind("inproc://shutdown").unwrap();
    let endpoint = connected.connect("inproc://shutdown").unwrap();

    thread::sleep(time::Duration::from_millis(100));

    connected.send(b"ping".to_vec()).unwrap();
    bound.set_recv_timeout(timeout).unwrap();
    assert_eq!(b"ping".to_vec(), bound.recv().unwrap());

    endpoint.shutdown().unwrap();
    thread::sleep(time::Duration::from_millis(100));

    connected.set_send_timeout(timeout).unwrap();
    let err = connected.send(b"pong".to_vec()).unwrap_err();
    assert_eq!(io::ErrorKind::TimedOut, err.kind());
}

#[test]
fn test_options_are_validated_and_read_back() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();

    let err = push.set_option(SocketOption::Subscribe("nope".to_string())).unwrap_err();
    assert_eq!(io::ErrorKind::InvalidInput, err.kind());

    let err = push.set_send_priority(0).unwrap_err();
    assert_eq!(io::ErrorKind::InvalidInput, err.kind());

    push.set_send_timeout(time::Duration::from_millis(250)).unwrap();

    let option = push.get_option(SocketOptionKind::SendTimeout).unwrap();
    assert_eq!(SocketOption::SendTimeout(Some(time::Duration::from_millis(250))), option);

    push.set_option(SocketOption::SocketName("pusher".to_string())).unwrap();

    let option = push.get_option(SocketOptionKind::SocketName).unwrap();
    assert_eq!(SocketOption::SocketName("pusher".to_string()), option);
}

#[test]
fn test_unknown_transport_is_rejected() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pair = session.create_socket(SocketType::Pair).unwrap();

    let err = pair.bind("tcp://127.0.0.1:5454").unwrap_err();
    assert_eq!(io::ErrorKind::InvalidInput, err.kind());

    let err = pair.connect("garbage").unwrap_err();
    assert_eq!(io::ErrorKind::InvalidInput, err.kind());
}

#[test]
fn test_bind_twice_is_refused() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut first = session.create_socket(SocketType::Pull).unwrap();
    let mut second = session.create_socket(SocketType::Pull).unwrap();

    first.bind("inproc://taken").unwrap();

    let err = second.bind("inproc://taken").unwrap_err();
    assert_eq!(io::ErrorKind::AddrInUse, err.kind());
}

#[test]
fn test_protocol_mismatch_is_refused() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut pair = session.create_socket(SocketType::Pair).unwrap();

    pull.bind("inproc://mismatch").unwrap();

    let err = pair.connect("inproc://mismatch").unwrap_err();
    assert_eq!(io::ErrorKind::InvalidInput, err.kind());
}

#[test]
fn test_poll_reports_readiness() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();

    pull.bind("inproc://poll").unwrap();
    push.connect("inproc://poll").unwrap();

    thread::sleep(time::Duration::from_millis(100));

    {
        let mut entries = vec![
            PollEntry::new(&pull, true, false),
            PollEntry::new(&push, false, true)
        ];
        let count = session.poll(&mut entries, time::Duration::from_millis(250)).unwrap();

        assert_eq!(1, count);
        assert!(!entries[0].is_readable());
        assert!(entries[1].is_writable());
    }

    push.send(vec![42]).unwrap();
    thread::sleep(time::Duration::from_millis(100));

    {
        let mut entries = vec![PollEntry::new(&pull, true, false)];
        let count = session.poll(&mut entries, time::Duration::from_millis(250)).unwrap();

        assert_eq!(1, count);
        assert!(entries[0].is_readable());
    }
}

#[test]
fn test_sockets_spread_over_several_workers() {
    let _ = env_logger::init();
    let session = Session::with_workers(2).unwrap();
    let mut bound = session.create_socket(SocketType::Pair).unwrap();
    let mut connected = session.create_socket(SocketType::Pair).unwrap();
    let timeout = time::Duration::from_millis(500);

    bound.set_recv_timeout(timeout).unwrap();
    bound.bind("inproc://workers").unwrap();

    connected.set_send_timeout(timeout).unwrap();
    connected.connect("inproc://workers").unwrap();

    for _ in 0..10 {
        let value = rand::random::<u8>();

        connected.send(vec![value]).unwrap();
        assert_eq!(vec![value], bound.recv().unwrap());
    }
}

#[test]
fn test_backpressure_is_released_by_the_reader() {
    let _ = env_logger::init();
    let session = Session::new().unwrap();
    let mut pull = session.create_socket(SocketType::Pull).unwrap();
    let mut push = session.create_socket(SocketType::Push).unwrap();

    pull.set_option(SocketOption::RecvBuffer(4)).unwrap();
    pull.bind("inproc://backpressure").unwrap();
    push.connect("inproc://backpressure").unwrap();

    thread::sleep(time::Duration::from_millis(100));

    push.send(vec![1, 1, 1, 1]).unwrap();

    // The queue is at capacity now, the next send has to wait for the
    // reader to make room.
    let err = push.try_send(vec![2, 2]).unwrap_err();
    assert_eq!(io::ErrorKind::WouldBlock, err.kind());

    push.set_send_timeout(time::Duration::from_millis(500)).unwrap();

    let sender = thread::spawn(move || {
        push.send(vec![3, 3]).unwrap();
    });

    pull.set_recv_timeout(time::Duration::from_millis(500)).unwrap();
    assert_eq!(vec![1, 1, 1, 1], pull.recv().unwrap());
    assert_eq!(vec![3, 3], pull.recv().unwrap());

    sender.join().unwrap();
}
